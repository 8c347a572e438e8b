//! Loading and merging.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use unimcp_engine::{CredentialSet, ToolCall};

use crate::error::{ConfigError, Result};
use crate::types::{ClientConfig, CliSettings, RunConfig};

/// Load a config file. `.toml` files are TOML; anything else is JSON.
pub fn load_config_file(path: &Path) -> Result<ClientConfig> {
    let contents = read(path)?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let parsed: std::result::Result<ClientConfig, String> = if is_toml {
        toml::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    };
    let config = parsed.map_err(|reason| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    })?;

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load `KEY=VALUE` lines from an env file.
///
/// Blank lines, `#` comments, and lines without `=` are skipped. Keys and
/// values are trimmed; the value is everything after the first `=`.
pub fn load_env_file(path: &Path) -> Result<CredentialSet> {
    let contents = read(path)?;
    let mut credentials = CredentialSet::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            credentials.insert(key.trim(), value.trim());
        }
    }
    Ok(credentials)
}

/// Parse one `--env` value into `credentials`.
///
/// A JSON object contributes all of its entries; otherwise the value must
/// be `KEY=VALUE`.
pub fn parse_env_arg(arg: &str, credentials: &mut CredentialSet) -> Result<()> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(arg) {
        for (key, value) in map {
            let value = env_value(&value).ok_or_else(|| ConfigError::InvalidEnv(arg.to_string()))?;
            credentials.insert(key, value);
        }
        return Ok(());
    }

    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            credentials.insert(key.trim(), value.trim());
            Ok(())
        }
        _ => Err(ConfigError::InvalidEnv(arg.to_string())),
    }
}

/// Parse one `--tool` value: a tool call object or an array of them.
pub fn parse_tool_arg(arg: &str) -> Result<Vec<ToolCall>> {
    let invalid = |reason: String| ConfigError::InvalidTool {
        input: arg.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(arg).map_err(|e| invalid(e.to_string()))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| invalid(e.to_string())))
            .collect(),
        Value::Object(_) => Ok(vec![
            serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?,
        ]),
        _ => Err(invalid("expected an object or an array of objects".to_string())),
    }
}

/// Credentials from the command line: the env file first, then each
/// `--env` value in order.
pub fn credentials_from_cli(env_file: Option<&Path>, env_args: &[String]) -> Result<CredentialSet> {
    let mut credentials = match env_file {
        Some(path) => load_env_file(path)?,
        None => CredentialSet::new(),
    };
    for arg in env_args {
        parse_env_arg(arg, &mut credentials)?;
    }
    Ok(credentials)
}

/// Tool calls from every `--tool` value, in order.
pub fn tools_from_cli(tool_args: &[String]) -> Result<Vec<ToolCall>> {
    let mut tools = Vec::new();
    for arg in tool_args {
        tools.extend(parse_tool_arg(arg)?);
    }
    Ok(tools)
}

/// Merge a config file over command-line settings.
///
/// The file wins: its server is preferred, its `env` and `tools` replace the
/// command line's entirely when present, and each of its options overrides
/// the matching flag.
pub fn merge(file: Option<ClientConfig>, cli: CliSettings) -> Result<RunConfig> {
    let file = file.unwrap_or_default();

    let server = [file.server.as_deref(), cli.server.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingServer)?;

    let credentials = match file.env {
        Some(env) => {
            tracing::debug!("config file env replaces command-line credentials");
            let mut credentials = CredentialSet::new();
            for (key, value) in env {
                let value = env_value(&value)
                    .ok_or_else(|| ConfigError::InvalidEnv(format!("{}={}", key, value)))?;
                credentials.insert(key, value);
            }
            credentials
        }
        None => cli.credentials,
    };

    let tools = match file.tools {
        Some(tools) => {
            tracing::debug!(count = tools.len(), "config file tools replace command-line tools");
            tools
        }
        None => cli.tools,
    };

    let options = file.options;
    let timeout_secs = options.timeout_secs.unwrap_or(cli.timeout_secs);

    Ok(RunConfig {
        server,
        credentials,
        tools,
        verbose: options.verbose.unwrap_or(cli.verbose),
        list_only: options.list_only.unwrap_or(cli.list_only),
        interactive: options.interactive.unwrap_or(cli.interactive),
        json: options.json.unwrap_or(cli.json),
        timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
    })
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// String form of a scalar env value. Arrays, objects and null are rejected.
fn env_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
