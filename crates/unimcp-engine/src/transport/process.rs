//! Child-process transport.
//!
//! Each message is one JSON document on one line, in both directions. The
//! process is spawned on the first send. A writer thread owns stdin so a
//! server that stops reading cannot block the caller past its timeout. A
//! reader thread turns stdout lines into frames; a third thread drains stderr
//! so the child never blocks on a full pipe.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::{Transport, TransportKind};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{McpError, Result};
use crate::protocol::OutgoingMessage;

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// How often shutdown polls for the child's exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration for a server process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable to run.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
    /// Time allowed for each shutdown step before escalating.
    pub shutdown_grace: Duration,
}

impl ProcessConfig {
    /// Create a config for `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Set arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set environment additions.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Set the per-step shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// One encoded line for the writer thread, with a channel for the outcome.
struct WriteJob {
    line: Vec<u8>,
    done: Sender<io::Result<()>>,
}

/// A spawned server and the plumbing around it.
struct RunningServer {
    child: Child,
    writer: Option<Sender<WriteJob>>,
    frames: Receiver<Value>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

/// Transport over a child process's standard streams.
pub struct ProcessTransport {
    config: ProcessConfig,
    diagnostics: Diagnostics,
    server: Option<RunningServer>,
    released: bool,
}

impl ProcessTransport {
    /// Create a transport. Nothing is spawned until the first send.
    pub fn new(config: ProcessConfig, diagnostics: Diagnostics) -> Self {
        Self {
            config,
            diagnostics,
            server: None,
            released: false,
        }
    }

    /// The process configuration.
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// OS process id, once spawned.
    pub fn pid(&self) -> Option<u32> {
        self.server.as_ref().map(|s| s.child.id())
    }

    fn spawn(&mut self) -> Result<&mut RunningServer> {
        if self.server.is_none() {
            let server = spawn_server(&self.config, &self.diagnostics)?;
            self.server = Some(server);
        }
        self.server
            .as_mut()
            .ok_or_else(|| McpError::transport_closed("server process is not running"))
    }

    /// Describe why the server can no longer be reached.
    fn closed_error(&mut self, what: &str) -> McpError {
        let Some(server) = self.server.as_mut() else {
            return McpError::transport_closed(what.to_string());
        };

        let status = match server.child.try_wait() {
            Ok(Some(status)) => describe_status(status),
            Ok(None) => "still running".to_string(),
            Err(e) => format!("status unknown: {}", e),
        };
        let tail = server
            .stderr_tail
            .lock()
            .map(|t| t.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        if tail.is_empty() {
            McpError::transport_closed(format!("{} (server {})", what, status))
        } else {
            McpError::transport_closed(format!(
                "{} (server {}); last stderr output:\n{}",
                what, status, tail
            ))
        }
    }

    fn shutdown(&mut self) {
        let Some(mut server) = self.server.take() else {
            return;
        };
        let grace = self.config.shutdown_grace;

        // Closing stdin is the protocol's request to exit. The writer thread
        // drops it once its queue is closed.
        drop(server.writer.take());
        if wait_for_exit(&mut server.child, grace) {
            tracing::debug!(command = %self.config.command, "MCP server exited after stdin closed");
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if let Ok(pid) = i32::try_from(server.child.id()) {
                if kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
                    && wait_for_exit(&mut server.child, grace)
                {
                    tracing::debug!(command = %self.config.command, "MCP server exited on SIGTERM");
                    return;
                }
            }
        }

        tracing::warn!(command = %self.config.command, "MCP server did not exit, killing it");
        let _ = server.child.kill();
        let _ = server.child.wait();
    }
}

impl Transport for ProcessTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }

    fn send(&mut self, message: &OutgoingMessage, timeout: Option<Duration>) -> Result<()> {
        if self.released {
            return Err(McpError::transport_closed("transport has been released"));
        }

        let json = message.to_json()?;
        self.diagnostics
            .emit(DiagnosticEvent::Outgoing { raw: &json });

        let server = self.spawn()?;
        let Some(writer) = server.writer.as_ref() else {
            return Err(McpError::transport_closed("server stdin is closed"));
        };

        let mut line = json.into_bytes();
        line.push(b'\n');
        let bytes = line.len();
        let (done, outcome) = mpsc::channel();
        if writer.send(WriteJob { line, done }).is_err() {
            return Err(self.closed_error("server stdin is closed"));
        }

        let written = match timeout {
            Some(t) => outcome.recv_timeout(t),
            None => outcome.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "write to MCP server failed");
                return Err(self.closed_error(&format!("failed to write to server: {}", e)));
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    command = %self.config.command,
                    "MCP server is not reading its input"
                );
                return Err(McpError::Timeout {
                    method: message.method().unwrap_or("response").to_string(),
                    after: timeout.unwrap_or_default(),
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(self.closed_error("server stdin is closed"));
            }
        }

        tracing::trace!(bytes, "sent MCP message");
        Ok(())
    }

    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Value>> {
        let Some(server) = self.server.as_ref() else {
            return Err(McpError::protocol("nothing has been sent to the server yet"));
        };

        let received = match timeout {
            Some(t) => server.frames.recv_timeout(t),
            None => server
                .frames
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(self.closed_error("server closed its output stream"))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.released = true;
        self.shutdown();
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        match self.server.as_mut() {
            Some(server) => matches!(server.child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_server(config: &ProcessConfig, diagnostics: &Diagnostics) -> Result<RunningServer> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .envs(config.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| McpError::transport_start(&config.command, e))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| McpError::transport_start(&config.command, "failed to capture stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| McpError::transport_start(&config.command, "failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| McpError::transport_start(&config.command, "failed to capture stderr"))?;

    let (writer, jobs) = mpsc::channel();
    thread::Builder::new()
        .name("mcp-stdin".to_string())
        .spawn(move || write_lines(BufWriter::new(stdin), jobs))
        .map_err(|e| McpError::transport_start(&config.command, e))?;

    let (tx, frames) = mpsc::channel();
    let stdout_diag = diagnostics.clone();
    thread::Builder::new()
        .name("mcp-stdout".to_string())
        .spawn(move || read_frames(stdout, tx, stdout_diag))
        .map_err(|e| McpError::transport_start(&config.command, e))?;

    let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    let tail = Arc::clone(&stderr_tail);
    let stderr_diag = diagnostics.clone();
    thread::Builder::new()
        .name("mcp-stderr".to_string())
        .spawn(move || drain_stderr(stderr, tail, stderr_diag))
        .map_err(|e| McpError::transport_start(&config.command, e))?;

    tracing::info!(
        command = %config.command,
        args = ?config.args,
        env = ?config.env.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        pid = child.id(),
        "started MCP server process"
    );

    Ok(RunningServer {
        child,
        writer: Some(writer),
        frames,
        stderr_tail,
    })
}

/// Write each queued line and report the outcome. Stdin closes when the
/// queue does or after the first failed write.
fn write_lines(mut stdin: impl Write, jobs: Receiver<WriteJob>) {
    for job in jobs {
        let written = stdin.write_all(&job.line).and_then(|_| stdin.flush());
        let failed = written.is_err();
        let _ = job.done.send(written);
        if failed {
            break;
        }
    }
}

/// Read newline-terminated chunks, forwarding each JSON document.
///
/// Blank lines are skipped. Lines that are not JSON are server chatter and
/// are skipped too.
fn read_frames(stdout: impl Read, tx: Sender<Value>, diagnostics: Diagnostics) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "error reading MCP server output");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(frame) => {
                diagnostics.emit(DiagnosticEvent::Incoming { raw: line });
                if tx.send(frame).is_err() {
                    break;
                }
            }
            Err(_) => {
                tracing::debug!(line = %line, "skipping non-JSON output from MCP server");
                diagnostics.emit(DiagnosticEvent::Discarded {
                    raw: line,
                    reason: "not a JSON document",
                });
            }
        }
    }
    tracing::debug!("MCP server output closed");
}

fn drain_stderr(stderr: impl Read, tail: Arc<Mutex<VecDeque<String>>>, diagnostics: Diagnostics) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        tracing::debug!(line = %line, "MCP server stderr");
        diagnostics.emit(DiagnosticEvent::ServerStderr { line });

        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
    }
}

/// Poll until the child exits or `within` elapses. True if it exited.
fn wait_for_exit(child: &mut Child, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() >= deadline => return false,
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(_) => return false,
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by signal".to_string(),
    }
}
