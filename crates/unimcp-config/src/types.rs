//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unimcp_engine::{CredentialSet, ToolCall};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Config file
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of a `--config-file`, JSON or TOML.
///
/// ```toml
/// server = "npx -y @modelcontextprotocol/server-google-maps"
///
/// [env]
/// GOOGLE_MAPS_API_KEY = "..."
///
/// [[tools]]
/// name = "maps_geocode"
/// arguments = { address = "1600 Amphitheatre Parkway" }
///
/// [options]
/// verbose = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server command line or URL.
    pub server: Option<String>,
    /// Credentials in file order. Scalar values are converted to strings.
    pub env: Option<Map<String, Value>>,
    /// Tools to call, in order.
    pub tools: Option<Vec<ToolCall>>,
    /// Behaviour switches.
    pub options: ConfigOptions,
}

/// Options section of a config file. Unset values fall back to the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    pub verbose: Option<bool>,
    pub list_only: Option<bool>,
    pub interactive: Option<bool>,
    pub json: Option<bool>,
    pub timeout_secs: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Command line
// ─────────────────────────────────────────────────────────────────────────────

/// Values taken from the command line, already parsed.
#[derive(Debug, Clone)]
pub struct CliSettings {
    pub server: Option<String>,
    pub credentials: CredentialSet,
    pub tools: Vec<ToolCall>,
    pub verbose: bool,
    pub list_only: bool,
    pub interactive: bool,
    pub json: bool,
    pub timeout_secs: u64,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            server: None,
            credentials: CredentialSet::new(),
            tools: Vec::new(),
            verbose: false,
            list_only: false,
            interactive: false,
            json: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merged result
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a run needs, after merging file and command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Server address, unparsed.
    pub server: String,
    /// Credentials for the server.
    pub credentials: CredentialSet,
    /// Tools to call, in order.
    pub tools: Vec<ToolCall>,
    /// Show raw protocol traffic.
    pub verbose: bool,
    /// Stop after listing capabilities.
    pub list_only: bool,
    /// Choose tools from a menu.
    pub interactive: bool,
    /// Machine-readable output.
    pub json: bool,
    /// Per-request timeout; `None` waits forever.
    pub timeout: Option<Duration>,
}
