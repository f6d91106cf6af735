//! Error types for pool operations.

use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Errors surfaced by pool lifecycle and submit operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no handler registered for job type '{job_type}'")]
    HandlerNotFound { job_type: String },

    #[error("job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("pool is shutting down")]
    ShuttingDown,

    #[error("pool has not been started")]
    NotStarted,

    #[error("pool is already running")]
    AlreadyStarted,
}

impl PoolError {
    /// Stable machine-readable code for HTTP surfacing.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HandlerNotFound { .. } => "handler_not_found",
            Self::QueueFull { .. } => "queue_full",
            Self::ShuttingDown => "shutting_down",
            Self::NotStarted => "not_started",
            Self::AlreadyStarted => "already_started",
        }
    }
}

/// Failure reported by a job handler (or synthesized by the worker when the
/// handler times out or panics).
///
/// The pool's retry decision depends only on the remaining attempt budget,
/// never on the error content.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error for a handler exceeding the per-job deadline.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(format!("job timed out after {:.0?}", timeout))
    }

    /// Error for a recovered handler panic.
    pub fn panicked(detail: &str) -> Self {
        Self::new(format!("handler panicked: {}", detail))
    }
}
