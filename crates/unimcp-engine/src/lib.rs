//! Universal MCP (Model Context Protocol) client engine.
//!
//! This crate connects to any MCP server, local or remote, discovers what it
//! offers, and invokes its tools.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolInvoker                                                │
//! │  - tools/call against the handshake snapshot                │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpSession (+ handshake)                                   │
//! │  - id allocation, reply correlation, timeouts               │
//! │  - initialize → initialized → tools/resources/prompts list  │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport                                                  │
//! │  - ProcessTransport: child process, one JSON doc per line   │
//! │  - RemoteTransport: HTTP POST per message                   │
//! │  - credentials → env vars or headers (auth)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use unimcp_engine::{CredentialSet, McpSession, ServerTarget, SessionOptions};
//!
//! let target = ServerTarget::parse("npx -y @modelcontextprotocol/server-everything")?;
//! let credentials = CredentialSet::new().with("API_TOKEN", "secret");
//!
//! let mut session = McpSession::open(&target, &credentials, SessionOptions::default())?;
//! let caps = session.handshake()?;
//! for tool in &caps.tools {
//!     println!("Tool: {} - {:?}", tool.name, tool.description);
//! }
//!
//! let outcome = session.invoker().invoke("echo", json!({"message": "hi"}))?;
//! session.close();
//! ```
//!
//! # Wire format
//!
//! JSON-RPC 2.0, protocol version `2025-06-18`. Process servers read one
//! compact JSON document per line on stdin and write the same on stdout;
//! anything else on stdout is ignored. Remote servers get one POST per
//! message and may answer with JSON or a short `text/event-stream`.

pub mod auth;
pub mod diagnostics;
pub mod error;
pub mod handshake;
pub mod invoker;
pub mod protocol;
pub mod session;
pub mod target;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use auth::CredentialSet;
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, Diagnostics, TracingSink};
pub use error::{ErrorKind, McpError, Result};
pub use handshake::{CapabilityCategory, ListingFailure, ServerCapabilities};
pub use invoker::{ToolCall, ToolInvoker, ToolOutcome};
pub use protocol::{
    CallToolResult, ClientInfo, JsonRpcError, PromptInfo, ResourceInfo, RpcOutcome, ServerInfo,
    ToolContent, ToolInfo,
};
pub use session::{McpSession, SessionOptions, SessionState};
pub use target::ServerTarget;
pub use transport::{Transport, TransportKind};
