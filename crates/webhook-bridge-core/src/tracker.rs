//! Execution tracker: opens a span per plugin invocation, closes it with the
//! outcome, and keeps storage failures away from the execution path.
//!
//! The tracker is deliberately forgiving: a storage write that fails is
//! logged and suppressed, and the returned context degrades to "untracked"
//! so the plugin call proceeds regardless. Availability of dispatch wins
//! over durability of the trace.

use crate::execution::{ExecutionRecord, ExecutionRequest, ExecutionResult, ExecutionStatus};
use crate::metrics::MetricsRegistry;
use crate::storage::ExecutionStorage;
use crate::ErrorKind;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;

/// Marker written in place of an oversized input or output payload.
pub const TRUNCATION_MARKER: &str = "[truncated]";

/// Default payload ceiling, 1 MiB.
const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

// ============================================================================
// Configuration
// ============================================================================

/// Tracker behavior knobs.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Master switch; when off, every context is untracked
    pub enabled: bool,

    /// Persist serialized input payloads
    pub track_input: bool,

    /// Persist serialized output payloads
    pub track_output: bool,

    /// Input payloads larger than this are replaced by the truncation marker
    pub max_input_size: usize,

    /// Output payloads larger than this are replaced by the truncation marker
    pub max_output_size: usize,

    /// How often the cleanup worker wakes up
    pub cleanup_interval: Duration,

    /// Records older than this many days are removed by cleanup
    pub retention_days: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_input: true,
            track_output: true,
            max_input_size: DEFAULT_MAX_PAYLOAD,
            max_output_size: DEFAULT_MAX_PAYLOAD,
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            retention_days: 30,
        }
    }
}

// ============================================================================
// Execution Context
// ============================================================================

/// Handle to an open execution span.
///
/// An untracked context (persistence failed or tracking disabled) makes
/// completion a no-op.
#[derive(Debug)]
pub struct ExecutionContext {
    record: Option<ExecutionRecord>,
}

impl ExecutionContext {
    fn untracked() -> Self {
        Self { record: None }
    }

    /// Whether the span was persisted at start.
    pub fn is_tracked(&self) -> bool {
        self.record.is_some()
    }

    /// Id of the underlying record, when tracked.
    pub fn execution_id(&self) -> Option<Uuid> {
        self.record.as_ref().map(|r| r.id)
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Records every execution attempt to durable storage and aggregates
/// in-memory metrics.
pub struct ExecutionTracker {
    storage: Arc<dyn ExecutionStorage>,
    metrics: Arc<MetricsRegistry>,
    config: TrackerConfig,
}

impl ExecutionTracker {
    pub fn new(storage: Arc<dyn ExecutionStorage>, config: TrackerConfig) -> Self {
        Self {
            storage,
            metrics: Arc::new(MetricsRegistry::new()),
            config,
        }
    }

    /// Storage handle, for read-side query endpoints.
    pub fn storage(&self) -> Arc<dyn ExecutionStorage> {
        Arc::clone(&self.storage)
    }

    /// Metrics registry handle.
    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Open a span for one plugin invocation.
    ///
    /// Never fails: when persistence is unavailable the returned context is
    /// untracked and the caller proceeds as normal.
    pub async fn start_execution(&self, request: &ExecutionRequest) -> ExecutionContext {
        if !self.config.enabled {
            return ExecutionContext::untracked();
        }

        let mut record = ExecutionRecord::begin(request);
        if self.config.track_input {
            record.input = Some(serialize_payload(&request.input, self.config.max_input_size));
        }

        match self.storage.save_execution(&record).await {
            Ok(()) => {
                debug!(
                    execution_id = %record.id,
                    plugin = %record.plugin_name,
                    "Opened execution span"
                );
                ExecutionContext {
                    record: Some(record),
                }
            }
            Err(e) => {
                warn!(
                    plugin = %record.plugin_name,
                    error = %e,
                    "Failed to persist execution start; continuing untracked"
                );
                ExecutionContext::untracked()
            }
        }
    }

    /// Close a span with the outcome of the execution.
    ///
    /// A no-op for untracked contexts. Storage update failures are logged
    /// and suppressed; metrics are still updated.
    pub async fn complete_execution(&self, ctx: ExecutionContext, result: &ExecutionResult) {
        let Some(mut record) = ctx.record else {
            return;
        };

        let end = Utc::now();
        record.end_time = Some(end);
        record.duration_ns = (end - record.start_time).num_nanoseconds();
        record.updated_at = end;

        match &result.error {
            None => {
                record.status = ExecutionStatus::Completed;
                if self.config.track_output {
                    if let Some(ref output) = result.output {
                        record.output =
                            Some(serialize_payload(output, self.config.max_output_size));
                    }
                }
            }
            Some(message) => {
                let kind = result
                    .error_kind
                    .unwrap_or_else(|| ErrorKind::classify(message));
                record.status = kind.terminal_status();
                record.error_message = Some(message.clone());
                record.error_type = Some(kind);
            }
        }

        if let Err(e) = self.storage.update_execution(&record).await {
            warn!(
                execution_id = %record.id,
                plugin = %record.plugin_name,
                error = %e,
                "Failed to persist execution outcome"
            );
        }

        self.metrics.record_execution(
            &record.plugin_name,
            record.duration().unwrap_or_default(),
            record.status,
            record.error_type,
        );
    }

    /// Mark every record still `running` as canceled.
    ///
    /// Called during shutdown after the pool has stopped: a handler that
    /// was cut off by the job deadline never got to close its span, and
    /// nothing may remain in a non-terminal state once shutdown returns.
    pub async fn cancel_running(&self) -> u64 {
        let filter = crate::execution::ExecutionFilter {
            status: Some(ExecutionStatus::Running),
            ..Default::default()
        };
        let running = match self.storage.list_executions(&filter).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not list running executions for cancellation");
                return 0;
            }
        };

        let mut canceled = 0;
        for mut record in running {
            let end = Utc::now();
            record.status = ExecutionStatus::Canceled;
            record.end_time = Some(end);
            record.duration_ns = (end - record.start_time).num_nanoseconds();
            record.error_message = Some("canceled by shutdown".to_string());
            record.error_type = Some(ErrorKind::Canceled);
            record.updated_at = end;

            match self.storage.update_execution(&record).await {
                Ok(()) => {
                    canceled += 1;
                    self.metrics.record_execution(
                        &record.plugin_name,
                        record.duration().unwrap_or_default(),
                        record.status,
                        record.error_type,
                    );
                }
                Err(e) => {
                    warn!(
                        execution_id = %record.id,
                        error = %e,
                        "Could not cancel running execution"
                    );
                }
            }
        }
        if canceled > 0 {
            info!(canceled, "Canceled executions left running at shutdown");
        }
        canceled
    }

    /// Spawn the retention cleanup worker.
    ///
    /// Wakes at the configured interval, deletes records older than the
    /// retention window, and exits promptly when the token is canceled.
    pub fn spawn_cleanup(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let interval = self.config.cleanup_interval;
        let retention_days = self.config.retention_days;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Execution cleanup worker stopping");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match storage.cleanup_old_executions(retention_days).await {
                            Ok(0) => {}
                            Ok(removed) => {
                                info!(removed, retention_days, "Removed expired execution records");
                            }
                            Err(e) => {
                                warn!(error = %e, "Execution cleanup pass failed");
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Serialize a payload map, replacing it with the truncation marker when it
/// exceeds the ceiling. The record is still written either way.
fn serialize_payload(
    payload: &std::collections::HashMap<String, serde_json::Value>,
    max_size: usize,
) -> String {
    let serialized = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    if serialized.len() > max_size {
        TRUNCATION_MARKER.to_string()
    } else {
        serialized
    }
}
