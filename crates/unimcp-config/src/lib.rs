//! Run configuration for the unimcp client.
//!
//! A run is described by a server address, credentials, and a list of tool
//! calls, gathered from up to three places:
//! - a config file (`--config-file`, JSON or TOML)
//! - an env file (`--env-file`, `KEY=VALUE` lines)
//! - command-line flags (`--server`, `--env`, `--tool`, ...)
//!
//! The config file takes precedence; see [`merge`].

pub mod error;
pub mod loader;
pub mod types;

pub use error::{ConfigError, Result};
pub use loader::{
    credentials_from_cli, load_config_file, load_env_file, merge, parse_env_arg, parse_tool_arg,
    tools_from_cli,
};
pub use types::{CliSettings, ClientConfig, ConfigOptions, DEFAULT_TIMEOUT_SECS, RunConfig};
