//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while assembling a run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config or env file.
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// A config file is not valid JSON or TOML.
    #[error("failed to parse config file '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// An `--env` value is neither `KEY=VALUE` nor a JSON object.
    #[error("invalid environment variable '{0}': expected KEY=VALUE or a JSON object")]
    InvalidEnv(String),

    /// A `--tool` value is not a tool call or a list of them.
    #[error("invalid tool specification '{input}': {reason}")]
    InvalidTool { input: String, reason: String },

    /// No server address anywhere.
    #[error("a server must be specified via --server or the config file")]
    MissingServer,
}
