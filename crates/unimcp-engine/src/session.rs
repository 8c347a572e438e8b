//! JSON-RPC session over a single transport.
//!
//! The session allocates request ids, keeps the pending table, and matches
//! replies to requests. It owns the transport outright: every request takes
//! `&mut self`, so at most one request is ever in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::auth::CredentialSet;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, Diagnostics};
use crate::error::{McpError, Result};
use crate::handshake::ServerCapabilities;
use crate::protocol::{
    ClientInfo, InboundMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, OutgoingMessage, RpcOutcome,
};
use crate::target::ServerTarget;
use crate::transport::{self, Transport, TransportKind, TransportOptions};

/// Lifecycle of a session. Moves strictly forward; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not yet bound to a transport.
    Uninitialized,
    /// Transport bound, handshake not yet complete.
    Initializing,
    /// Handshake complete; tools may be invoked.
    Ready,
    /// Transport released.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Identity announced in `initialize`.
    pub client_info: ClientInfo,
    /// Per-request reply timeout. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Grace period for each step of process shutdown.
    pub shutdown_grace: Duration,
    /// TCP connect timeout for remote servers.
    pub connect_timeout: Duration,
    /// Verbose hook.
    pub diagnostics: Diagnostics,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let transport = TransportOptions::default();
        Self {
            client_info: ClientInfo::default(),
            request_timeout: Some(Duration::from_secs(60)),
            shutdown_grace: transport.shutdown_grace,
            connect_timeout: transport.connect_timeout,
            diagnostics: transport.diagnostics,
        }
    }
}

impl SessionOptions {
    /// Set the client identity.
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Set the per-request timeout (`None` disables it).
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the process shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the remote connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Report raw traffic to `sink`.
    pub fn with_diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Diagnostics::new(sink);
        self
    }

    fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            shutdown_grace: self.shutdown_grace,
            connect_timeout: self.connect_timeout,
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// An outstanding request.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    sent_at: Instant,
}

/// A JSON-RPC session with one MCP server.
pub struct McpSession {
    transport: Box<dyn Transport>,
    state: SessionState,
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
    options: SessionOptions,
    capabilities: Option<ServerCapabilities>,
}

impl McpSession {
    /// Build the transport for `target` and bind a session to it.
    ///
    /// Credentials are mapped to environment entries or headers depending
    /// on the target. A process server is not spawned until the first
    /// message is sent.
    pub fn open(
        target: &ServerTarget,
        credentials: &CredentialSet,
        options: SessionOptions,
    ) -> Result<Self> {
        let transport = transport::connect(target, credentials, &options.transport_options())?;
        tracing::info!(
            target = %target,
            credentials = credentials.len(),
            "opened MCP session"
        );
        Ok(Self::with_transport(transport, options))
    }

    /// Bind a session to an already-built transport and start it.
    pub fn with_transport(transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        let mut session = Self::new(transport, options);
        session.state = SessionState::Initializing;
        session
    }

    /// Bind a session to a transport without starting it.
    ///
    /// The session stays [`SessionState::Uninitialized`] and refuses all
    /// traffic until [`start`](Self::start) is called.
    pub fn new(transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        Self {
            transport,
            state: SessionState::Uninitialized,
            next_id: 1,
            pending: HashMap::new(),
            options,
            capabilities: None,
        }
    }

    /// Move an unstarted session to [`SessionState::Initializing`] so the
    /// handshake can run.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(McpError::InvalidState {
                operation: "start a session",
                state: self.state,
            });
        }
        self.state = SessionState::Initializing;
        tracing::debug!(transport = ?self.transport.kind(), "MCP session started");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server capabilities, once the handshake has completed.
    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.as_ref()
    }

    /// Session settings.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Kind of transport underneath.
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Check if the transport can still carry traffic.
    pub fn is_connected(&mut self) -> bool {
        self.state != SessionState::Closed && self.transport.is_connected()
    }

    /// Send a request and wait for its reply.
    ///
    /// An error object from the server is returned as `Ok(Err(_))`. Transport
    /// faults and timeouts close the session before being returned.
    pub fn request(&mut self, method: &str, params: Option<Value>) -> Result<RpcOutcome> {
        self.ensure_open("send a request")?;
        if let Some((id, pending)) = self.pending.iter().next() {
            return Err(McpError::protocol(format!(
                "request {} ('{}') is still awaiting a reply",
                id, pending.method
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                sent_at: Instant::now(),
            },
        );

        tracing::debug!(id, method = %method, "sending MCP request");
        let message = OutgoingMessage::Request(JsonRpcRequest::new(id, method, params));
        let result = self.exchange(&message, id, method);

        match result {
            Err(e) if e.is_fatal() => {
                self.abort(&e);
                Err(e)
            }
            other => {
                if let Some(done) = self.pending.remove(&id) {
                    tracing::debug!(
                        id,
                        method = %done.method,
                        elapsed_ms = done.sent_at.elapsed().as_millis() as u64,
                        "MCP request finished"
                    );
                }
                other
            }
        }
    }

    /// Send a notification. No reply is expected and no id is consumed.
    pub fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.ensure_open("send a notification")?;
        let message = OutgoingMessage::Notification(JsonRpcNotification::new(method, params));
        tracing::debug!(method = %method, "sending MCP notification");

        let result = self.transport.send(&message, self.options.request_timeout);
        if let Err(e) = &result {
            if e.is_fatal() {
                self.abort(e);
            }
        }
        result
    }

    /// Release the transport. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.pending.clear();
        self.state = SessionState::Closed;
        if let Err(e) = self.transport.close() {
            tracing::warn!(error = %e, "error releasing MCP transport");
        }
        tracing::debug!("MCP session closed");
    }

    pub(crate) fn mark_ready(&mut self, capabilities: ServerCapabilities) -> &ServerCapabilities {
        self.state = SessionState::Ready;
        self.capabilities.insert(capabilities)
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        match self.state {
            SessionState::Initializing | SessionState::Ready => Ok(()),
            SessionState::Closed => Err(McpError::SessionClosed),
            state @ SessionState::Uninitialized => Err(McpError::InvalidState { operation, state }),
        }
    }

    fn exchange(&mut self, message: &OutgoingMessage, id: u64, method: &str) -> Result<RpcOutcome> {
        let timeout = self.options.request_timeout;
        self.transport.send(message, timeout)?;
        self.await_reply(id, method, timeout)
    }

    fn await_reply(&mut self, id: u64, method: &str, timeout: Option<Duration>) -> Result<RpcOutcome> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let timed_out = || McpError::Timeout {
            method: method.to_string(),
            after: timeout.unwrap_or_default(),
        };

        loop {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(timed_out());
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            let Some(frame) = self.transport.recv(remaining)? else {
                return Err(timed_out());
            };

            let raw = self
                .options
                .diagnostics
                .is_enabled()
                .then(|| frame.to_string());
            let peeked = InboundMessage::peek_id(&frame);

            match InboundMessage::classify(frame) {
                Ok(InboundMessage::Response(response)) => {
                    if response.request_id() == Some(id) {
                        return Ok(response.into_outcome());
                    }
                    tracing::warn!(
                        id = %response.id,
                        awaiting = id,
                        "discarding reply that matches no pending request"
                    );
                    self.discarded(raw.as_deref(), "reply id matches no pending request");
                }
                Ok(InboundMessage::Request {
                    id: request_id,
                    method: server_method,
                }) => {
                    self.answer_server_request(request_id, &server_method)?;
                }
                Ok(InboundMessage::Notification { method }) => {
                    tracing::debug!(method = %method, "MCP server notification");
                }
                Err(e) if peeked == Some(id) => {
                    tracing::warn!(id, error = %e, "malformed reply to pending request");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed frame");
                    self.discarded(raw.as_deref(), "malformed frame");
                }
            }
        }
    }

    /// Reply to a request the server sent us.
    fn answer_server_request(&mut self, id: Value, method: &str) -> Result<()> {
        let response = if method == "ping" {
            tracing::debug!("answering MCP server ping");
            JsonRpcResponse::success(id, json!({}))
        } else {
            tracing::debug!(method = %method, "rejecting unsupported MCP server request");
            JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    JsonRpcError::METHOD_NOT_FOUND,
                    format!("method not supported by client: {}", method),
                ),
            )
        };
        self.transport
            .send(&OutgoingMessage::Response(response), self.options.request_timeout)
    }

    fn discarded(&self, raw: Option<&str>, reason: &str) {
        if let Some(raw) = raw {
            self.options
                .diagnostics
                .emit(DiagnosticEvent::Discarded { raw, reason });
        }
    }

    /// Fail everything in flight with `err` and close.
    fn abort(&mut self, err: &McpError) {
        for (id, pending) in self.pending.drain() {
            tracing::warn!(id, method = %pending.method, error = %err, "MCP request failed");
        }
        self.close();
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("transport", &self.transport.kind())
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}
