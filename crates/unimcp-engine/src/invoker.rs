//! Tool invocation against a Ready session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{McpError, Result};
use crate::protocol::{CallToolParams, CallToolResult, JsonRpcError};
use crate::session::{McpSession, SessionState};

/// A tool to call and the arguments to call it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name, as declared by the server.
    pub name: String,
    /// Argument object.
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

impl ToolCall {
    /// Create a call with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: empty_arguments(),
        }
    }

    /// Set the argument object.
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

/// How a tool call ended, when the exchange itself succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The server ran the tool. The result may still flag a tool-level error.
    Completed(CallToolResult),
    /// The server rejected the call with a JSON-RPC error.
    Failed(JsonRpcError),
}

impl ToolOutcome {
    /// Check if this outcome represents success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(result) if !result.is_error())
    }
}

/// Issues `tools/call` requests through a borrowed session.
#[derive(Debug)]
pub struct ToolInvoker<'s> {
    session: &'s mut McpSession,
}

impl McpSession {
    /// Borrow the session for tool calls.
    pub fn invoker(&mut self) -> ToolInvoker<'_> {
        ToolInvoker { session: self }
    }
}

impl ToolInvoker<'_> {
    /// Call one tool.
    ///
    /// The name must appear in the handshake snapshot; unknown tools are
    /// rejected before anything is sent. `null` arguments mean `{}`.
    pub fn invoke(&mut self, name: &str, arguments: Value) -> Result<ToolOutcome> {
        match self.session.state() {
            SessionState::Ready => {}
            SessionState::Closed => return Err(McpError::SessionClosed),
            state => {
                return Err(McpError::InvalidState {
                    operation: "invoke a tool",
                    state,
                });
            }
        }

        let known = self
            .session
            .capabilities()
            .is_some_and(|caps| caps.has_tool(name));
        if !known {
            return Err(McpError::UnknownTool(name.to_string()));
        }

        let arguments = match arguments {
            Value::Null => empty_arguments(),
            args @ Value::Object(_) => args,
            other => {
                return Err(McpError::configuration(format!(
                    "arguments for tool '{}' must be a JSON object, got {}",
                    name, other
                )));
            }
        };

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;

        tracing::debug!(tool = %name, "calling MCP tool");
        match self.session.request("tools/call", Some(params))? {
            Ok(result) => {
                let result: CallToolResult = serde_json::from_value(result).map_err(|e| {
                    McpError::malformed(format!("invalid result from tool '{}': {}", name, e))
                })?;
                if result.is_error() {
                    tracing::debug!(tool = %name, "MCP tool reported an error");
                }
                Ok(ToolOutcome::Completed(result))
            }
            Err(rpc) => {
                tracing::debug!(tool = %name, code = rpc.code, "MCP tool call rejected");
                Ok(ToolOutcome::Failed(rpc))
            }
        }
    }

    /// Call each tool in order, one result per call.
    ///
    /// Once the session closes, the remaining calls fail with
    /// [`McpError::SessionClosed`] without being attempted.
    pub fn invoke_all(&mut self, calls: &[ToolCall]) -> Vec<Result<ToolOutcome>> {
        calls
            .iter()
            .map(|call| {
                if self.session.state() == SessionState::Closed {
                    return Err(McpError::SessionClosed);
                }
                self.invoke(&call.name, call.arguments.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{OutgoingMessage, ToolContent};
    use crate::session::SessionOptions;
    use crate::testing::{ScriptedTransport, Step, conforming_server, error_reply, reply};
    use serde_json::json;
    use std::time::Duration;

    fn ready_session(
        responder: impl FnMut(&OutgoingMessage) -> Vec<Step> + Send + 'static,
    ) -> (McpSession, crate::testing::SharedLog) {
        let (transport, log) = ScriptedTransport::new(responder);
        let options =
            SessionOptions::default().with_request_timeout(Some(Duration::from_millis(200)));
        let mut session = McpSession::with_transport(Box::new(transport), options);
        session.handshake().unwrap();
        (session, log)
    }

    fn tools() -> Value {
        json!([{"name": "echo"}, {"name": "fail"}, {"name": "hang"}])
    }

    #[test]
    fn test_invoke_sends_tools_call() {
        let (mut session, log) = ready_session(conforming_server(tools()));

        let outcome = session
            .invoker()
            .invoke("echo", json!({"text": "hello"}))
            .unwrap();
        match outcome {
            ToolOutcome::Completed(result) => {
                assert_eq!(result.text().unwrap(), r#"{"text":"hello"}"#);
                assert!(!result.is_error());
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let log = log.lock().unwrap();
        let call = log.sent.last().unwrap();
        assert_eq!(call["method"], json!("tools/call"));
        assert_eq!(call["params"], json!({"name": "echo", "arguments": {"text": "hello"}}));
    }

    #[test]
    fn test_null_arguments_become_empty_object() {
        let (mut session, log) = ready_session(conforming_server(tools()));
        session.invoker().invoke("echo", Value::Null).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.sent.last().unwrap()["params"]["arguments"], json!({}));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let (mut session, log) = ready_session(conforming_server(tools()));
        let sent_before = log.lock().unwrap().sent.len();
        let err = session.invoker().invoke("echo", json!([1, 2])).unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
        assert_eq!(log.lock().unwrap().sent.len(), sent_before);
    }

    #[test]
    fn test_unknown_tool_sends_nothing() {
        let (mut session, log) = ready_session(conforming_server(tools()));
        let sent_before = log.lock().unwrap().sent.len();

        let err = session.invoker().invoke("missing", json!({})).unwrap_err();
        assert!(matches!(err, McpError::UnknownTool(ref name) if name == "missing"));
        assert_eq!(log.lock().unwrap().sent.len(), sent_before);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_invoke_before_handshake() {
        let (transport, _) = ScriptedTransport::new(conforming_server(tools()));
        let mut session = McpSession::with_transport(Box::new(transport), SessionOptions::default());
        let err = session.invoker().invoke("echo", json!({})).unwrap_err();
        assert!(matches!(
            err,
            McpError::InvalidState {
                state: SessionState::Initializing,
                ..
            }
        ));
    }

    #[test]
    fn test_rpc_error_is_failed_outcome() {
        let mut server = conforming_server(tools());
        let (mut session, _) = ready_session(move |msg| match msg {
            OutgoingMessage::Request(req) if req.method == "tools/call" => {
                vec![Step::Frame(error_reply(req.id, -32602, "missing argument 'text'"))]
            }
            other => server(other),
        });

        let outcome = session.invoker().invoke("echo", json!({})).unwrap();
        match outcome {
            ToolOutcome::Failed(err) => {
                assert_eq!(err.code, -32602);
                assert!(err.message.contains("text"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_tool_level_error_and_unknown_content() {
        let mut server = conforming_server(tools());
        let (mut session, _) = ready_session(move |msg| match msg {
            OutgoingMessage::Request(req) if req.method == "tools/call" => {
                vec![Step::Frame(reply(
                    req.id,
                    json!({
                        "content": [
                            {"type": "text", "text": "quota exceeded"},
                            {"type": "hologram", "payload": "?"}
                        ],
                        "isError": true
                    }),
                ))]
            }
            other => server(other),
        });

        let outcome = session.invoker().invoke("fail", json!({})).unwrap();
        assert!(!outcome.is_success());
        let ToolOutcome::Completed(result) = outcome else {
            panic!("expected Completed");
        };
        assert!(result.is_error());
        assert_eq!(result.content[1], ToolContent::Unknown);
    }

    #[test]
    fn test_wrong_result_shape_is_malformed() {
        let mut server = conforming_server(tools());
        let (mut session, _) = ready_session(move |msg| match msg {
            OutgoingMessage::Request(req) if req.method == "tools/call" => {
                vec![Step::Frame(reply(req.id, json!({"content": "not a list"})))]
            }
            other => server(other),
        });

        let err = session.invoker().invoke("echo", json!({})).unwrap_err();
        assert!(matches!(err, McpError::MalformedResponse(_)));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_invoke_all_stops_after_close() {
        let mut server = conforming_server(tools());
        let (mut session, log) = ready_session(move |msg| match msg {
            OutgoingMessage::Request(req) if req.method == "tools/call" => {
                let name = req.params.as_ref().and_then(|p| p["name"].as_str());
                if name == Some("hang") {
                    Vec::new()
                } else {
                    server(msg)
                }
            }
            other => server(other),
        });

        let calls = vec![
            ToolCall::new("echo").with_arguments(json!({"n": 1})),
            ToolCall::new("missing"),
            ToolCall::new("hang"),
            ToolCall::new("echo"),
        ];
        let results = session.invoker().invoke_all(&calls);

        assert_eq!(results.len(), 4);
        assert!(matches!(results[0], Ok(ToolOutcome::Completed(_))));
        assert!(matches!(results[1], Err(McpError::UnknownTool(_))));
        assert!(matches!(results[2], Err(McpError::Timeout { .. })));
        assert!(matches!(results[3], Err(McpError::SessionClosed)));
        assert_eq!(session.state(), SessionState::Closed);

        let calls_sent = log
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|m| m["method"] == "tools/call")
            .count();
        assert_eq!(calls_sent, 2);
    }

    #[test]
    fn test_tool_call_deserializes_without_arguments() {
        let call: ToolCall = serde_json::from_value(json!({"name": "echo"})).unwrap();
        assert_eq!(call, ToolCall::new("echo"));
    }
}
