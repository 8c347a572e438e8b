//! In-memory transport for driving sessions in unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::{McpError, Result};
use crate::protocol::{MCP_PROTOCOL_VERSION, OutgoingMessage};
use crate::transport::{Transport, TransportKind};

/// What the fake server does after receiving a message.
pub(crate) enum Step {
    /// Deliver this frame.
    Frame(Value),
    /// Die: the next receive fails with `TransportClosed`.
    Hangup,
}

/// Everything the session did to the transport.
#[derive(Debug, Default)]
pub(crate) struct TransportLog {
    pub sent: Vec<Value>,
    pub close_calls: usize,
}

pub(crate) type SharedLog = Arc<Mutex<TransportLog>>;

type Responder = Box<dyn FnMut(&OutgoingMessage) -> Vec<Step> + Send>;

pub(crate) struct ScriptedTransport {
    responder: Responder,
    inbox: VecDeque<Step>,
    log: SharedLog,
    closed: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(
        responder: impl FnMut(&OutgoingMessage) -> Vec<Step> + Send + 'static,
    ) -> (Self, SharedLog) {
        let log = SharedLog::default();
        let transport = Self {
            responder: Box::new(responder),
            inbox: VecDeque::new(),
            log: Arc::clone(&log),
            closed: false,
        };
        (transport, log)
    }
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }

    fn send(&mut self, message: &OutgoingMessage, _timeout: Option<Duration>) -> Result<()> {
        if self.closed {
            return Err(McpError::transport_closed("scripted transport closed"));
        }
        let frame: Value = serde_json::from_str(&message.to_json()?)?;
        self.log.lock().unwrap().sent.push(frame);
        let steps = (self.responder)(message);
        self.inbox.extend(steps);
        Ok(())
    }

    fn recv(&mut self, _timeout: Option<Duration>) -> Result<Option<Value>> {
        match self.inbox.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Hangup) => {
                self.closed = true;
                Err(McpError::transport_closed("scripted server hung up"))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.log.lock().unwrap().close_calls += 1;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        !self.closed
    }
}

/// A success reply for request `id`.
pub(crate) fn reply(id: u64, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

/// An error reply for request `id`.
pub(crate) fn error_reply(id: u64, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Responder for a well-behaved server exposing `tools`.
///
/// `tools/call` answers with the call's arguments rendered as text.
pub(crate) fn conforming_server(tools: Value) -> impl FnMut(&OutgoingMessage) -> Vec<Step> + Send {
    move |msg| {
        let OutgoingMessage::Request(req) = msg else {
            return Vec::new();
        };
        let result = match req.method.as_str() {
            "initialize" => json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "scripted", "version": "1.0.0"}
            }),
            "tools/list" => json!({"tools": tools.clone()}),
            "resources/list" => json!({"resources": []}),
            "prompts/list" => json!({"prompts": []}),
            "tools/call" => {
                let arguments = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("arguments"))
                    .cloned()
                    .unwrap_or(Value::Null);
                json!({"content": [{"type": "text", "text": arguments.to_string()}]})
            }
            _ => return vec![Step::Frame(error_reply(req.id, -32601, "method not found"))],
        };
        vec![Step::Frame(reply(req.id, result))]
    }
}
