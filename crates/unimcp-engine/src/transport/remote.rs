//! HTTP transport.
//!
//! Every outgoing message is one POST to a fixed endpoint. The reply to a
//! request arrives in that POST's response body, either as a JSON document
//! or as a `text/event-stream` whose `data:` events carry JSON frames.

use std::collections::VecDeque;
use std::error::Error as _;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use super::{Transport, TransportKind};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{McpError, Result};
use crate::protocol::OutgoingMessage;

/// Header a server uses to assign a session, replayed on later requests.
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

const ACCEPT_VALUE: &str = "application/json, text/event-stream";
const EVENT_STREAM: &str = "text/event-stream";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL, used verbatim.
    pub url: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Headers sent with every request, usually credentials.
    pub headers: Vec<(String, String)>,
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            headers: Vec::new(),
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Transport that POSTs each message to a remote MCP endpoint.
pub struct RemoteTransport {
    client: Client,
    config: HttpTransportConfig,
    headers: HeaderMap,
    session_id: Option<String>,
    inbox: VecDeque<Value>,
    diagnostics: Diagnostics,
    closed: bool,
}

impl RemoteTransport {
    /// Validate the configuration and build the HTTP client.
    ///
    /// No network traffic happens until the first send.
    pub fn connect(config: HttpTransportConfig, diagnostics: Diagnostics) -> Result<Self> {
        url::Url::parse(&config.url).map_err(|e| {
            McpError::configuration(format!("invalid server URL '{}': {}", config.url, e))
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                McpError::configuration(format!("credential '{}' is not a valid header name", name))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                McpError::configuration(format!("value for header '{}' is not valid", name))
            })?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| McpError::configuration(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(
            url = %config.url,
            headers = ?config.headers.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "created HTTP transport"
        );

        Ok(Self {
            client,
            config,
            headers,
            session_id: None,
            inbox: VecDeque::new(),
            diagnostics,
            closed: false,
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Header list as it goes on the wire, for the diagnostic hook.
    fn wire_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            (CONTENT_TYPE.to_string(), "application/json".to_string()),
            (ACCEPT.to_string(), ACCEPT_VALUE.to_string()),
        ];
        headers.extend(self.config.headers.iter().cloned());
        if let Some(id) = &self.session_id {
            headers.push((SESSION_ID_HEADER.to_string(), id.clone()));
        }
        headers
    }

    fn post(&self, body: &str, method: &str, timeout: Option<Duration>) -> Result<Response> {
        let mut request = self
            .client
            .post(&self.config.url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE)
            .body(body.to_string());
        if let Some(id) = &self.session_id {
            request = request.header(SESSION_ID_HEADER, id);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        request
            .send()
            .map_err(|e| map_reqwest_error(e, method, timeout))
    }

    fn remember_session(&mut self, response: &Response) {
        let Some(id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };
        if self.session_id.as_deref() != Some(id) {
            tracing::debug!(session_id = %id, "server assigned MCP session");
            self.session_id = Some(id.to_string());
        }
    }

    /// Queue every JSON frame carried by a response body.
    fn accept_body(&mut self, body: &str, is_event_stream: bool) -> Result<()> {
        if is_event_stream {
            for data in sse_data(body) {
                match serde_json::from_str::<Value>(&data) {
                    Ok(frame) => {
                        self.diagnostics
                            .emit(DiagnosticEvent::Incoming { raw: &data });
                        self.inbox.push_back(frame);
                    }
                    Err(_) => {
                        tracing::debug!(data = %data, "skipping non-JSON event from MCP server");
                        self.diagnostics.emit(DiagnosticEvent::Discarded {
                            raw: &data,
                            reason: "event data is not a JSON document",
                        });
                    }
                }
            }
            return Ok(());
        }

        let frame: Value = serde_json::from_str(body.trim()).map_err(|e| {
            McpError::malformed(format!("response body is not JSON ({}): {}", e, body))
        })?;
        self.diagnostics
            .emit(DiagnosticEvent::Incoming { raw: body.trim() });
        match frame {
            // Batched replies.
            Value::Array(frames) => self.inbox.extend(frames),
            frame => self.inbox.push_back(frame),
        }
        Ok(())
    }
}

impl Transport for RemoteTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    fn send(&mut self, message: &OutgoingMessage, timeout: Option<Duration>) -> Result<()> {
        if self.closed {
            return Err(McpError::transport_closed("transport has been released"));
        }

        let body = message.to_json()?;
        let method = message.method().unwrap_or("response").to_string();
        if self.diagnostics.is_enabled() {
            let headers = self.wire_headers();
            self.diagnostics.emit(DiagnosticEvent::HttpRequest {
                url: &self.config.url,
                headers: &headers,
                body: &body,
            });
            self.diagnostics.emit(DiagnosticEvent::Outgoing { raw: &body });
        }

        let response = self.post(&body, &method, timeout)?;
        self.remember_session(&response);

        let status = response.status();
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().starts_with(EVENT_STREAM));
        let text = response
            .text()
            .map_err(|e| map_reqwest_error(e, &method, timeout))?;
        self.diagnostics.emit(DiagnosticEvent::HttpResponse {
            status: status.as_u16(),
            body: &text,
        });

        if !message.expects_reply() {
            if !status.is_success() {
                tracing::warn!(
                    method = %method,
                    status = status.as_u16(),
                    body = %text,
                    "MCP server rejected notification"
                );
            }
            return Ok(());
        }

        if !status.is_success() {
            return Err(McpError::HttpStatus {
                code: status.as_u16(),
                body: text,
            });
        }

        self.accept_body(&text, is_event_stream)
    }

    fn recv(&mut self, _timeout: Option<Duration>) -> Result<Option<Value>> {
        self.inbox.pop_front().map(Some).ok_or_else(|| {
            McpError::malformed("response body did not carry the awaited reply")
        })
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            tracing::debug!(url = %self.config.url, "closing HTTP transport");
        }
        self.closed = true;
        self.inbox.clear();
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        !self.closed
    }
}

fn map_reqwest_error(err: reqwest::Error, method: &str, timeout: Option<Duration>) -> McpError {
    if err.is_timeout() {
        if let Some(after) = timeout {
            return McpError::Timeout {
                method: method.to_string(),
                after,
            };
        }
    }

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    McpError::network(message)
}

/// Extract the `data` payload of each event in a server-sent event stream.
///
/// Multi-line `data:` fields are joined with newlines; events without data
/// are dropped.
fn sse_data(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                events.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            current.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // event:, id:, retry: and comment lines carry nothing we need.
    }
    if !current.is_empty() {
        events.push(current.join("\n"));
    }
    events
}
