//! Job structure: the unit of deferred work moving through the pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

/// Terminal outcome of a job, set by the handler (success) or the pool
/// (failure).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,

    /// Handler-provided result payload
    pub data: HashMap<String, serde_json::Value>,

    /// Failure message, when the job failed
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: HashMap::new(),
            error: Some(error.into()),
        }
    }
}

/// A unit of deferred work.
///
/// Created by the submitter, mutated only by the worker currently owning
/// it, and dropped once a terminal outcome has been counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque id, unique per process lifetime; assigned at submit if empty
    pub id: String,

    /// Type tag selecting the handler, e.g. "webhook"
    pub job_type: String,

    /// Free-form payload interpreted by the handler
    pub payload: HashMap<String, serde_json::Value>,

    /// Scheduling hint; larger runs sooner when the queue supports it.
    /// The current queue is FIFO, so this is advisory only.
    pub priority: i32,

    /// Number of handler invocations so far
    pub attempts: u32,

    /// Attempt budget; 0 at submit means "use the pool default"
    pub max_attempts: u32,

    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Terminal outcome, present once the job finished
    pub result: Option<JobResult>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, payload: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: String::new(),
            job_type: job_type.into(),
            payload,
            priority: 0,
            attempts: 0,
            max_attempts: 0,
            created_at: None,
            started_at: None,
            finished_at: None,
            result: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Assign a fresh id unless the submitter provided one.
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = format!("job-{}", Uuid::new_v4());
        }
    }

    /// Clear per-attempt state before a retry re-enqueue.
    pub(crate) fn reset_for_retry(&mut self) {
        self.started_at = None;
        self.finished_at = None;
        self.result = None;
    }

    /// Whether the attempt budget still allows a retry.
    pub(crate) fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
