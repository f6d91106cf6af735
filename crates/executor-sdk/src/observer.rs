//! Observer hooks the client accepts by setter: a log sink and a stats sink.
//!
//! Both are thin capability interfaces so tests can pass in-memory sinks and
//! assert on observed events without a global logger. Implementations must
//! not block the data path on anything slower than an in-memory append.

use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;

/// Severity of a client log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry emitted around an execute call.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub plugin: String,
    pub method: String,
    /// Synthetic id correlating the before/after entries of one call
    pub request_id: String,
    pub message: String,
}

/// Receives client log entries.
pub trait LogSink: Send + Sync {
    fn append(&self, entry: LogEntry);
}

/// Receives execution statistics.
pub trait StatsSink: Send + Sync {
    /// Record one completed execute call.
    fn record_execution(&self, plugin: &str, method: &str, duration: Duration, success: bool);

    /// Record an error observation (call failure or status >= 400).
    fn record_error(&self, plugin: &str, method: &str, message: &str);
}

// ============================================================================
// In-memory sinks
// ============================================================================

/// Log sink that appends to a vector; for tests and local inspection.
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("log sink lock poisoned").clone()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, entry: LogEntry) {
        self.entries
            .lock()
            .expect("log sink lock poisoned")
            .push(entry);
    }
}

/// One recorded execution observation.
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    pub plugin: String,
    pub method: String,
    pub duration: Duration,
    pub success: bool,
}

/// One recorded error observation.
#[derive(Debug, Clone)]
pub struct RecordedError {
    pub plugin: String,
    pub method: String,
    pub message: String,
}

/// Stats sink that appends to vectors; for tests and local inspection.
#[derive(Default)]
pub struct MemoryStatsSink {
    executions: Mutex<Vec<RecordedExecution>>,
    errors: Mutex<Vec<RecordedError>>,
}

impl MemoryStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions
            .lock()
            .expect("stats sink lock poisoned")
            .clone()
    }

    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors.lock().expect("stats sink lock poisoned").clone()
    }
}

impl StatsSink for MemoryStatsSink {
    fn record_execution(&self, plugin: &str, method: &str, duration: Duration, success: bool) {
        self.executions
            .lock()
            .expect("stats sink lock poisoned")
            .push(RecordedExecution {
                plugin: plugin.to_string(),
                method: method.to_string(),
                duration,
                success,
            });
    }

    fn record_error(&self, plugin: &str, method: &str, message: &str) {
        self.errors
            .lock()
            .expect("stats sink lock poisoned")
            .push(RecordedError {
                plugin: plugin.to_string(),
                method: method.to_string(),
                message: message.to_string(),
            });
    }
}

// ============================================================================
// Tracing sink
// ============================================================================

/// Log sink that forwards entries to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => info!(
                plugin = %entry.plugin,
                method = %entry.method,
                request_id = %entry.request_id,
                "{}",
                entry.message
            ),
            LogLevel::Warn => warn!(
                plugin = %entry.plugin,
                method = %entry.method,
                request_id = %entry.request_id,
                "{}",
                entry.message
            ),
            LogLevel::Error => error!(
                plugin = %entry.plugin,
                method = %entry.method,
                request_id = %entry.request_id,
                "{}",
                entry.message
            ),
        }
    }
}
