//! Verbose protocol trace on stderr.

use console::{Term, style};
use unimcp_engine::{DiagnosticEvent, DiagnosticSink};

/// Prints every diagnostic event to stderr, one line per event.
pub struct ConsoleSink {
    term: Term,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl DiagnosticSink for ConsoleSink {
    fn record(&self, event: &DiagnosticEvent<'_>) {
        let _ = self.term.write_line(&describe(event));
    }
}

/// One-line rendering of an event.
fn describe(event: &DiagnosticEvent<'_>) -> String {
    match event {
        DiagnosticEvent::Outgoing { raw } => format!("{} {}", style("📤 Sending:").cyan(), raw),
        DiagnosticEvent::Incoming { raw } => {
            format!("{} {}", style("📥 Received:").green(), raw)
        }
        DiagnosticEvent::HttpRequest { url, headers, body } => {
            let headers: Vec<String> = headers
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .collect();
            format!(
                "{} POST {} [{}] {}",
                style("🌐 Request:").cyan(),
                url,
                headers.join(", "),
                body
            )
        }
        DiagnosticEvent::HttpResponse { status, body } => {
            format!("{} {} {}", style("🌐 Response:").green(), status, body)
        }
        DiagnosticEvent::ServerStderr { line } => {
            format!("{} {}", style("server:").dim(), line)
        }
        DiagnosticEvent::Discarded { raw, reason } => {
            format!("{} {} ({})", style("⚠ Discarded:").yellow(), raw, reason)
        }
    }
}
