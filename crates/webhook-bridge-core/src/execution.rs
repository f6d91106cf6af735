//! Execution record types: the request that starts a span, the result that
//! closes it, and the persisted trace of one attempt.

use crate::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Canceled,
}

impl ExecutionStatus {
    /// Stable string tag used in storage and HTTP responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
        }
    }

    /// Whether the execution has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = crate::StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            "canceled" => Ok(Self::Canceled),
            other => Err(crate::StorageError::Corrupt {
                message: format!("unknown execution status '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Request / Result
// ============================================================================

/// Everything the tracker needs to open a span for one plugin invocation.
///
/// Built by the webhook job handler per invocation; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Name of the plugin being invoked
    pub plugin_name: String,

    /// HTTP method of the originating webhook request
    pub http_method: String,

    /// Normalized input payload
    pub input: HashMap<String, serde_json::Value>,

    /// Which delivery attempt this is (1-based)
    pub attempt: u32,

    /// Caller user agent, when the ingress captured one
    pub user_agent: Option<String>,

    /// Caller remote IP, when the ingress captured one
    pub remote_ip: Option<String>,

    /// Correlation id propagated from the HTTP request
    pub trace_id: Option<String>,

    /// Free-form labels for filtering
    pub tags: HashMap<String, String>,

    /// Free-form metadata carried on the record
    pub metadata: HashMap<String, String>,
}

impl ExecutionRequest {
    pub fn new(plugin_name: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            http_method: http_method.into(),
            input: HashMap::new(),
            attempt: 1,
            user_agent: None,
            remote_ip: None,
            trace_id: None,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_input(mut self, input: HashMap<String, serde_json::Value>) -> Self {
        self.input = input;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_remote_ip(mut self, remote_ip: impl Into<String>) -> Self {
        self.remote_ip = Some(remote_ip.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Outcome delivered to the tracker when an execution finishes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Output payload from the plugin, when the call succeeded
    pub output: Option<HashMap<String, serde_json::Value>>,

    /// Error message, when the call failed
    pub error: Option<String>,

    /// Kind override for faults classified at the source (pool, tracker)
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionResult {
    /// A successful result carrying the plugin output.
    pub fn success(output: HashMap<String, serde_json::Value>) -> Self {
        Self {
            output: Some(output),
            error: None,
            error_kind: None,
        }
    }

    /// A failed result; the kind is classified from the message unless
    /// overridden with [`ExecutionResult::with_kind`].
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(error.into()),
            error_kind: None,
        }
    }

    /// Pin the error kind instead of classifying by message.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Record
// ============================================================================

/// The persisted trace of one execution attempt.
///
/// Invariants maintained by the tracker:
/// - `status = completed` implies `end_time` set and no error fields
/// - `status` in {failed, timeout, canceled} implies `end_time`,
///   `error_message`, and `error_type` all set
/// - `duration_ns = end_time - start_time` once both are present
/// - `attempts >= 1` and `retry_count = attempts - 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub plugin_name: String,
    pub http_method: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration in nanoseconds, set when the span closes
    pub duration_ns: Option<i64>,
    /// Serialized input payload, possibly replaced by the truncation marker
    pub input: Option<String>,
    /// Serialized output payload, possibly replaced by the truncation marker
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub error_type: Option<ErrorKind>,
    pub attempts: u32,
    pub retry_count: u32,
    pub trace_id: Option<String>,
    pub user_agent: Option<String>,
    pub remote_ip: Option<String>,
    pub tags: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Open a new running record for the given request.
    pub fn begin(request: &ExecutionRequest) -> Self {
        let now = Utc::now();
        let attempts = request.attempt.max(1);
        Self {
            id: Uuid::new_v4(),
            plugin_name: request.plugin_name.clone(),
            http_method: request.http_method.clone(),
            status: ExecutionStatus::Running,
            start_time: now,
            end_time: None,
            duration_ns: None,
            input: None,
            output: None,
            error_message: None,
            error_type: None,
            attempts,
            retry_count: attempts - 1,
            trace_id: request.trace_id.clone(),
            user_agent: request.user_agent.clone(),
            remote_ip: request.remote_ip.clone(),
            tags: request.tags.clone(),
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Duration as a [`std::time::Duration`], when the span has closed.
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.duration_ns
            .and_then(|ns| u64::try_from(ns).ok())
            .map(std::time::Duration::from_nanos)
    }
}

// ============================================================================
// Filter / Stats
// ============================================================================

/// Filter for listing and aggregating execution records.
///
/// All fields are conjunctive; `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub plugin_name: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub error_type: Option<ErrorKind>,
    pub trace_id: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    /// Records must carry every tag in this map
    pub tags: HashMap<String, String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ExecutionFilter {
    pub fn for_plugin(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: Some(plugin_name.into()),
            ..Default::default()
        }
    }

    /// Check a record against every constraint in the filter.
    ///
    /// `limit`/`offset` are pagination, not constraints, and are ignored.
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        if let Some(ref plugin) = self.plugin_name {
            if &record.plugin_name != plugin {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(kind) = self.error_type {
            if record.error_type != Some(kind) {
                return false;
            }
        }
        if let Some(ref trace_id) = self.trace_id {
            if record.trace_id.as_deref() != Some(trace_id.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.started_after {
            if record.start_time < after {
                return false;
            }
        }
        if let Some(before) = self.started_before {
            if record.start_time > before {
                return false;
            }
        }
        for (key, value) in &self.tags {
            if record.tags.get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

/// Per-status counts within a stats aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub completed: u64,
    pub failed: u64,
    pub timeout: u64,
    pub canceled: u64,
    pub running: u64,
    pub pending: u64,
}

/// Aggregated view over a filtered set of execution records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: u64,
    pub by_status: StatusCounts,
    /// Success rate over terminal executions, 0.0 - 1.0
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl ExecutionStats {
    /// Compute stats from an already-filtered record set.
    pub fn from_records<'a>(records: impl Iterator<Item = &'a ExecutionRecord>) -> Self {
        let mut stats = Self::default();
        let mut durations_ns: Vec<i64> = Vec::new();

        for record in records {
            stats.total += 1;
            match record.status {
                ExecutionStatus::Completed => stats.by_status.completed += 1,
                ExecutionStatus::Failed => stats.by_status.failed += 1,
                ExecutionStatus::Timeout => stats.by_status.timeout += 1,
                ExecutionStatus::Canceled => stats.by_status.canceled += 1,
                ExecutionStatus::Running => stats.by_status.running += 1,
                ExecutionStatus::Pending => stats.by_status.pending += 1,
            }
            if let Some(ns) = record.duration_ns {
                durations_ns.push(ns);
            }
        }

        let terminal = stats.by_status.completed
            + stats.by_status.failed
            + stats.by_status.timeout
            + stats.by_status.canceled;
        if terminal > 0 {
            stats.success_rate = stats.by_status.completed as f64 / terminal as f64;
        }

        if !durations_ns.is_empty() {
            let sum: i64 = durations_ns.iter().sum();
            let min = *durations_ns.iter().min().unwrap_or(&0);
            let max = *durations_ns.iter().max().unwrap_or(&0);
            stats.avg_duration_ms = sum as f64 / durations_ns.len() as f64 / 1_000_000.0;
            stats.min_duration_ms = min as f64 / 1_000_000.0;
            stats.max_duration_ms = max as f64 / 1_000_000.0;
        }

        stats
    }
}
