//! Verbose/diagnostic hook.
//!
//! The engine reports raw traffic to a caller-supplied [`DiagnosticSink`].
//! Sinks observe; they never influence what the engine does.

use std::sync::Arc;

/// One observable engine event.
#[derive(Debug, Clone, Copy)]
pub enum DiagnosticEvent<'a> {
    /// Raw envelope about to be transmitted.
    Outgoing {
        /// Encoded JSON document.
        raw: &'a str,
    },
    /// Raw JSON frame received from the server.
    Incoming {
        /// Encoded JSON document.
        raw: &'a str,
    },
    /// HTTP request about to be sent by the remote transport.
    HttpRequest {
        /// Endpoint URL.
        url: &'a str,
        /// Exact headers, including credential headers.
        headers: &'a [(String, String)],
        /// Exact request body.
        body: &'a str,
    },
    /// HTTP response received by the remote transport.
    HttpResponse {
        /// Status code.
        status: u16,
        /// Exact response body.
        body: &'a str,
    },
    /// A line the server process wrote to its error stream.
    ServerStderr {
        /// The line, without its terminator.
        line: &'a str,
    },
    /// Inbound data that was dropped.
    Discarded {
        /// The dropped data.
        raw: &'a str,
        /// Why it was dropped.
        reason: &'a str,
    },
}

/// Receiver for [`DiagnosticEvent`]s.
pub trait DiagnosticSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &DiagnosticEvent<'_>);
}

/// Forwards every event to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: &DiagnosticEvent<'_>) {
        match event {
            DiagnosticEvent::Outgoing { raw } => tracing::trace!(json = %raw, "sending MCP message"),
            DiagnosticEvent::Incoming { raw } => {
                tracing::trace!(json = %raw, "received MCP message")
            }
            DiagnosticEvent::HttpRequest { url, headers, body } => {
                tracing::trace!(url = %url, ?headers, body = %body, "sending MCP HTTP request")
            }
            DiagnosticEvent::HttpResponse { status, body } => {
                tracing::trace!(status, body = %body, "received MCP HTTP response")
            }
            DiagnosticEvent::ServerStderr { line } => tracing::trace!(line = %line, "server stderr"),
            DiagnosticEvent::Discarded { raw, reason } => {
                tracing::trace!(raw = %raw, reason = %reason, "discarded inbound data")
            }
        }
    }
}

/// Optional sink handle threaded through sessions and transports.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Diagnostics {
    /// No sink: events are dropped.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Report events to `sink`.
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Whether a sink is attached.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Record an event if a sink is attached.
    pub fn emit(&self, event: DiagnosticEvent<'_>) {
        if let Some(sink) = &self.sink {
            sink.record(&event);
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that remembers a summary of each event.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Mutex<Vec<String>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn record(&self, event: &DiagnosticEvent<'_>) {
            let summary = match event {
                DiagnosticEvent::Outgoing { raw } => format!("out {}", raw),
                DiagnosticEvent::Incoming { raw } => format!("in {}", raw),
                DiagnosticEvent::HttpRequest { url, .. } => format!("http-req {}", url),
                DiagnosticEvent::HttpResponse { status, .. } => format!("http-resp {}", status),
                DiagnosticEvent::ServerStderr { line } => format!("stderr {}", line),
                DiagnosticEvent::Discarded { reason, .. } => format!("discarded {}", reason),
            };
            self.events.lock().unwrap().push(summary);
        }
    }

    #[test]
    fn test_disabled_drops_events() {
        let diag = Diagnostics::disabled();
        assert!(!diag.is_enabled());
        diag.emit(DiagnosticEvent::Outgoing { raw: "{}" });
    }

    #[test]
    fn test_enabled_forwards_events() {
        let sink = Arc::new(RecordingSink::default());
        let diag = Diagnostics::new(sink.clone());
        diag.emit(DiagnosticEvent::Outgoing { raw: "{\"id\":1}" });
        diag.emit(DiagnosticEvent::ServerStderr { line: "booting" });

        let events = sink.events.lock().unwrap();
        assert_eq!(events.as_slice(), ["out {\"id\":1}", "stderr booting"]);
    }
}
