//! Progress log: timestamped, append-only text lines for the host to display.

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// One progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Local time the line was emitted
    pub at: DateTime<Local>,
    /// Line text
    pub message: String,
}

impl LogLine {
    /// Create a line stamped now
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Receives progress lines. Informational only: never an error channel.
pub trait LogSink: Send + Sync {
    /// Called once per line, in order
    fn emit(&self, line: &LogLine);

    /// Called with `true` when the run starts waiting for midnight and with
    /// `false` once the wait is over (elapsed or canceled)
    fn midnight_wait(&self, _waiting: bool) {}
}

impl<F> LogSink for F
where
    F: Fn(&LogLine) + Send + Sync,
{
    fn emit(&self, line: &LogLine) {
        self(line);
    }
}

/// Sink that keeps every line in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<LogLine>>>,
    waits: Arc<Mutex<Vec<bool>>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, without timestamps
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|l| l.message.clone())
            .collect()
    }

    /// Whether any message contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    /// Midnight-wait transitions received so far
    #[must_use]
    pub fn midnight_waits(&self) -> Vec<bool> {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: &LogLine) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.clone());
    }

    fn midnight_wait(&self, waiting: bool) {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(waiting);
    }
}

/// Run-side handle: mirrors each line to `tracing` and forwards it to the sink
#[derive(Clone, Default)]
pub struct ProgressLog {
    sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for ProgressLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressLog")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl ProgressLog {
    /// Log that forwards to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Progress line
    pub fn info(&self, message: impl Into<String>) {
        let line = LogLine::now(message);
        tracing::info!(target: "gymbook::run", "{}", line.message);
        self.forward(&line);
    }

    /// Recoverable problem, still a progress line
    pub fn warn(&self, message: impl Into<String>) {
        let line = LogLine::now(message);
        tracing::warn!(target: "gymbook::run", "{}", line.message);
        self.forward(&line);
    }

    /// Signal the start or end of the midnight wait
    pub fn midnight_wait(&self, waiting: bool) {
        tracing::debug!(target: "gymbook::run", waiting, "midnight wait");
        if let Some(sink) = &self.sink {
            sink.midnight_wait(waiting);
        }
    }

    fn forward(&self, line: &LogLine) {
        if let Some(sink) = &self.sink {
            sink.emit(line);
        }
    }
}
