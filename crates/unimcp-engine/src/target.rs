//! Server address classification.

use crate::error::{McpError, Result};

/// Scheme prefixes that mark an address as a remote endpoint.
const REMOTE_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Where the server lives. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    /// Spawn a local process and speak over its standard streams.
    Process {
        /// Executable to run.
        command: String,
        /// Arguments passed to it.
        args: Vec<String>,
    },
    /// POST every message to a fixed HTTP(S) endpoint.
    Remote {
        /// Endpoint URL, used verbatim.
        url: String,
    },
}

impl ServerTarget {
    /// Classify a server address string.
    ///
    /// Addresses starting with `http://` or `https://` are remote and kept
    /// verbatim; everything else is a command line, split with shell-like
    /// quoting rules.
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(McpError::configuration("server address is empty"));
        }

        if REMOTE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            return Ok(Self::Remote {
                url: trimmed.to_string(),
            });
        }

        let mut parts = shlex::split(trimmed).ok_or_else(|| {
            McpError::configuration(format!("cannot parse server command: {}", trimmed))
        })?;
        if parts.is_empty() {
            return Err(McpError::configuration("server command is empty"));
        }
        let command = parts.remove(0);

        Ok(Self::Process {
            command,
            args: parts,
        })
    }

    /// Build a process target directly.
    pub fn process(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Process {
            command: command.into(),
            args,
        }
    }

    /// Build a remote target directly.
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    /// Check if this is a remote target.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Check if this is a process target.
    pub fn is_process(&self) -> bool {
        matches!(self, Self::Process { .. })
    }
}

impl std::fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process { command, args } if args.is_empty() => write!(f, "{}", command),
            Self::Process { command, args } => write!(f, "{} {}", command, args.join(" ")),
            Self::Remote { url } => write!(f, "{}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_urls_kept_verbatim() {
        for url in [
            "https://api.example.com/mcp",
            "http://localhost:8080",
            "https://host/path?x=1",
        ] {
            assert_eq!(ServerTarget::parse(url).unwrap(), ServerTarget::remote(url));
        }
    }

    #[test]
    fn test_remote_is_trimmed_but_not_suffixed() {
        let target = ServerTarget::parse("  https://api.example.com/mcp \n").unwrap();
        assert_eq!(target, ServerTarget::remote("https://api.example.com/mcp"));
    }

    #[test]
    fn test_scheme_match_is_case_sensitive() {
        let target = ServerTarget::parse("HTTPS://example.com").unwrap();
        assert!(target.is_process());
    }

    #[test]
    fn test_process_command_line() {
        let target = ServerTarget::parse("./my-server --flag").unwrap();
        assert_eq!(
            target,
            ServerTarget::process("./my-server", vec!["--flag".to_string()])
        );
    }

    #[test]
    fn test_process_quoting() {
        let target =
            ServerTarget::parse(r#"npx -y "@scope/server maps" --name='a b' c\ d"#).unwrap();
        assert_eq!(
            target,
            ServerTarget::process(
                "npx",
                vec![
                    "-y".to_string(),
                    "@scope/server maps".to_string(),
                    "--name=a b".to_string(),
                    "c d".to_string(),
                ]
            )
        );
    }

    #[test]
    fn test_empty_address_is_configuration_error() {
        for address in ["", "   ", "\t\n"] {
            assert!(matches!(
                ServerTarget::parse(address),
                Err(McpError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_unbalanced_quote_is_configuration_error() {
        assert!(matches!(
            ServerTarget::parse("server \"unterminated"),
            Err(McpError::Configuration(_))
        ));
    }

    #[test]
    fn test_display() {
        let target = ServerTarget::process("srv", vec!["--a".into(), "b".into()]);
        assert_eq!(target.to_string(), "srv --a b");
    }
}
