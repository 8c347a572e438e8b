//! unimcp - universal MCP client
//!
//! Connects to any MCP server, local command or remote URL, lists what it
//! offers and calls the requested tools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use unimcp_config::{CliSettings, RunConfig};
use unimcp_engine::{McpSession, ServerTarget, SessionOptions, ToolCall};

mod interactive;
mod render;
mod sink;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Universal MCP client - test any MCP server
#[derive(Parser, Debug)]
#[command(name = "unimcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON or TOML file with server, env, tools and options
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Server command line or http(s) URL
    /// (e.g. "npx -y @modelcontextprotocol/server-google-maps")
    #[arg(long, value_name = "ADDR", env = "UNIMCP_SERVER")]
    pub server: Option<String>,

    /// Credential as KEY=VALUE or a JSON object (repeatable)
    #[arg(long = "env", value_name = "KV|JSON")]
    pub env_vars: Vec<String>,

    /// Load credentials from a KEY=VALUE file
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Tool to call, as JSON {"name": ..., "arguments": {...}} (repeatable)
    #[arg(long = "tool", value_name = "JSON")]
    pub tools: Vec<String>,

    /// Choose tools from a numbered menu
    #[arg(long)]
    pub interactive: bool,

    /// Only list capabilities, do not call tools
    #[arg(long)]
    pub list_only: bool,

    /// Show every protocol message
    #[arg(short, long)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long)]
    pub json: bool,

    /// Per-request timeout in seconds, 0 to wait forever
    #[arg(long, value_name = "SECS", default_value_t = unimcp_config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl Cli {
    /// Resolve flags and the optional config file into a run configuration.
    fn into_run_config(self) -> Result<RunConfig> {
        let file = self
            .config_file
            .as_deref()
            .map(unimcp_config::load_config_file)
            .transpose()?;

        let credentials =
            unimcp_config::credentials_from_cli(self.env_file.as_deref(), &self.env_vars)?;
        let tools = unimcp_config::tools_from_cli(&self.tools)?;

        let settings = CliSettings {
            server: self.server,
            credentials,
            tools,
            verbose: self.verbose,
            list_only: self.list_only,
            interactive: self.interactive,
            json: self.json,
            timeout_secs: self.timeout,
        };
        Ok(unimcp_config::merge(file, settings)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.into_run_config()?;
    run(config)
}

/// Console logging to stderr. `RUST_LOG` overrides the built-in filter.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::prelude::*;

    let default = if verbose {
        "unimcp=debug,unimcp_engine=debug,unimcp_config=debug,info"
    } else {
        "unimcp=info,unimcp_engine=info,unimcp_config=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn run(config: RunConfig) -> Result<()> {
    let target = ServerTarget::parse(&config.server)?;

    let mut options = SessionOptions::default()
        .with_client_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .with_request_timeout(config.timeout);
    if let Some(timeout) = config.timeout {
        options = options.with_connect_timeout(timeout.min(Duration::from_secs(30)));
    }
    if config.verbose {
        options = options.with_diagnostic_sink(Arc::new(sink::ConsoleSink::new()));
    }

    if !config.json {
        eprintln!(
            "{}",
            render::banner(&config.server, config.credentials.names())
        );
    }

    let mut session = McpSession::open(&target, &config.credentials, options)?;
    let capabilities = session
        .handshake()
        .with_context(|| format!("failed to initialize MCP server {}", target))?
        .clone();

    if !config.json {
        println!("{}", render::snapshot(&capabilities));
    }

    let calls: Vec<ToolCall> = if config.interactive && !config.list_only {
        interactive::select_tools(&capabilities.tools)?
    } else {
        config.tools.clone()
    };

    let results = if config.list_only {
        Vec::new()
    } else {
        session.invoker().invoke_all(&calls)
    };

    if config.json {
        let report = render::json_report(&capabilities, &calls, &results);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (call, result) in calls.iter().zip(&results) {
            println!("{}", render::tool_result(&call.name, result));
        }
    }

    session.close();
    tracing::debug!(calls = results.len(), "session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::parse_from([
            "unimcp",
            "--server",
            "node server.js",
            "--env",
            "A=1",
            "--env",
            "B=2",
            "--tool",
            r#"{"name": "echo"}"#,
            "--list-only",
            "-v",
        ]);
        assert_eq!(cli.server.as_deref(), Some("node server.js"));
        assert_eq!(cli.env_vars, vec!["A=1", "B=2"]);
        assert_eq!(cli.tools.len(), 1);
        assert!(cli.list_only);
        assert!(cli.verbose);
        assert_eq!(cli.timeout, 60);
    }

    #[test]
    fn test_into_run_config_merges_flags() {
        let cli = Cli::parse_from([
            "unimcp",
            "--server",
            "https://example.com/mcp",
            "--env",
            "API_KEY=abc",
            "--tool",
            r#"{"name": "search", "arguments": {"q": "x"}}"#,
            "--timeout",
            "0",
        ]);
        let config = cli.into_run_config().unwrap();
        assert_eq!(config.server, "https://example.com/mcp");
        assert_eq!(config.credentials.get("API_KEY"), Some("abc"));
        assert_eq!(config.tools[0].name, "search");
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_into_run_config_requires_server() {
        let cli = Cli::parse_from(["unimcp", "--list-only"]);
        let err = cli.into_run_config().unwrap_err();
        assert!(err.to_string().contains("server must be specified"));
    }
}
