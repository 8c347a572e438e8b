//! Transport layer for MCP communication.
//!
//! A [`Transport`] moves whole JSON-RPC frames. Local servers run as child
//! processes speaking newline-delimited JSON ([`ProcessTransport`]); remote
//! servers take one HTTP POST per message ([`RemoteTransport`]). The session
//! above does all id correlation, so a new transport only has to frame.

use std::time::Duration;

use serde_json::Value;

use crate::auth::{self, CredentialSet};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::protocol::OutgoingMessage;
use crate::target::ServerTarget;

pub mod process;
pub mod remote;

pub use process::{ProcessConfig, ProcessTransport};
pub use remote::{HttpTransportConfig, RemoteTransport};

/// Which kind of channel a transport uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Child process over standard streams.
    Process,
    /// HTTP POST per message.
    Remote,
}

/// Channel carrying protocol frames to and from one server.
pub trait Transport: Send {
    /// The kind of channel.
    fn kind(&self) -> TransportKind;

    /// Transmit one message.
    ///
    /// `timeout` bounds the write itself. The remote transport also waits
    /// for the reply inside it.
    fn send(&mut self, message: &OutgoingMessage, timeout: Option<Duration>) -> Result<()>;

    /// Wait for the next inbound JSON frame.
    ///
    /// Returns `Ok(None)` if `timeout` elapsed first. `None` waits forever.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Value>>;

    /// Release the channel. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Check if the channel can still carry traffic.
    fn is_connected(&mut self) -> bool;
}

/// Transport construction settings.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// How long a process gets between each shutdown step.
    pub shutdown_grace: Duration,
    /// TCP connect timeout for remote servers.
    pub connect_timeout: Duration,
    /// Verbose hook.
    pub diagnostics: Diagnostics,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            diagnostics: Diagnostics::disabled(),
        }
    }
}

/// Build the transport for `target`, delivering `credentials` the way that
/// transport carries them.
pub fn connect(
    target: &ServerTarget,
    credentials: &CredentialSet,
    options: &TransportOptions,
) -> Result<Box<dyn Transport>> {
    match target {
        ServerTarget::Process { command, args } => {
            let config = ProcessConfig::new(command.clone())
                .with_args(args.clone())
                .with_env(auth::to_env(credentials))
                .with_shutdown_grace(options.shutdown_grace);
            Ok(Box::new(ProcessTransport::new(
                config,
                options.diagnostics.clone(),
            )))
        }
        ServerTarget::Remote { url } => {
            let mut config =
                HttpTransportConfig::new(url.clone()).with_connect_timeout(options.connect_timeout);
            for (name, value) in auth::to_headers(credentials) {
                config = config.with_header(name, value);
            }
            Ok(Box::new(RemoteTransport::connect(
                config,
                options.diagnostics.clone(),
            )?))
        }
    }
}
