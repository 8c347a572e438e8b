//! Error types for MCP operations.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::JsonRpcError;
use crate::session::SessionState;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server address or credential material is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failed to spawn the MCP server process.
    #[error("failed to start MCP server '{command}': {reason}")]
    TransportStart {
        /// Command that was being spawned.
        command: String,
        /// Underlying OS error description.
        reason: String,
    },

    /// Connection-level fault talking to a remote server.
    #[error("network error: {0}")]
    Network(String),

    /// The transport went away while a reply was still expected.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// No reply arrived within the per-call timeout.
    #[error("timed out after {after:?} waiting for '{method}'")]
    Timeout {
        /// Method of the request that timed out.
        method: String,
        /// The timeout that expired.
        after: Duration,
    },

    /// Remote server answered with a non-success HTTP status.
    #[error("HTTP status {code}: {body}")]
    HttpStatus {
        /// HTTP status code.
        code: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// A reply could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered a request with a JSON-RPC error object.
    #[error("server error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The initialize/initialized/list sequence failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<McpError>),

    /// Tool is not part of the server's declared capabilities.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// The session has been closed; nothing was sent.
    #[error("session is closed")]
    SessionClosed,

    /// Operation not permitted in the session's current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        /// What the caller attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// The peer broke a protocol rule.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Coarse classification of an [`McpError`], for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    TransportStart,
    Network,
    TransportClosed,
    Timeout,
    HttpStatus,
    MalformedResponse,
    Rpc,
    Handshake,
    UnknownTool,
    SessionClosed,
    InvalidState,
    Protocol,
}

impl McpError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a transport start error.
    pub fn transport_start(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransportStart {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a transport closed error.
    pub fn transport_closed(msg: impl Into<String>) -> Self {
        Self::TransportClosed(msg.into())
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Wrap a cause as a handshake failure.
    pub fn handshake(cause: McpError) -> Self {
        Self::Handshake(Box::new(cause))
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::TransportStart { .. } => ErrorKind::TransportStart,
            Self::Network(_) => ErrorKind::Network,
            Self::TransportClosed(_) => ErrorKind::TransportClosed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::MalformedResponse(_) | Self::Json(_) => ErrorKind::MalformedResponse,
            Self::Rpc(_) => ErrorKind::Rpc,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::SessionClosed => ErrorKind::SessionClosed,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// Whether this error compromises the session, forcing it closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportStart { .. }
                | Self::Network(_)
                | Self::TransportClosed(_)
                | Self::Timeout { .. }
                | Self::Handshake(_)
        )
    }

    /// The innermost cause, looking through handshake wrapping.
    pub fn root_cause(&self) -> &McpError {
        match self {
            Self::Handshake(inner) => inner.root_cause(),
            other => other,
        }
    }
}
