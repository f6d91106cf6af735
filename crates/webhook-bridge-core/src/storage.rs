//! Storage contract for execution history.
//!
//! Implementations must be safe for concurrent calls from many workers; the
//! tracker does not serialize access on their behalf.

use crate::execution::{ExecutionFilter, ExecutionRecord, ExecutionStats};
use crate::{StorageError, TrackingResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Descriptive information about a storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Backend tag, e.g. "sqlite" or "memory"
    pub backend: String,

    /// Location of the backing store, when it has one
    pub location: Option<String>,

    /// Number of records currently held
    pub record_count: u64,

    /// Start time of the oldest record, when any exist
    pub oldest_record: Option<DateTime<Utc>>,
}

/// Persistence contract for execution records.
///
/// `update_execution` on an id that was never saved fails with
/// [`StorageError::NotFound`]. `close` is idempotent; operations after
/// `close` fail with [`StorageError::Closed`].
#[async_trait]
pub trait ExecutionStorage: Send + Sync {
    /// Prepare the backend (create tables, open pools). Called once at startup.
    async fn initialize(&self) -> TrackingResult<()>;

    /// Persist a new record.
    async fn save_execution(&self, record: &ExecutionRecord) -> TrackingResult<()>;

    /// Fetch a record by id.
    async fn get_execution(&self, id: Uuid) -> TrackingResult<ExecutionRecord>;

    /// Replace an existing record (single row update).
    async fn update_execution(&self, record: &ExecutionRecord) -> TrackingResult<()>;

    /// Remove a record by id.
    async fn delete_execution(&self, id: Uuid) -> TrackingResult<()>;

    /// List records matching the filter, newest first.
    async fn list_executions(&self, filter: &ExecutionFilter) -> TrackingResult<Vec<ExecutionRecord>>;

    /// Aggregate stats over records matching the filter.
    async fn get_execution_stats(&self, filter: &ExecutionFilter) -> TrackingResult<ExecutionStats>;

    /// Delete records older than the retention window. Returns rows removed.
    async fn cleanup_old_executions(&self, retention_days: u32) -> TrackingResult<u64>;

    /// Describe the backend.
    async fn storage_info(&self) -> TrackingResult<StorageInfo>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> TrackingResult<()>;

    /// Release resources. Idempotent.
    async fn close(&self) -> TrackingResult<()>;
}

/// Cutoff timestamp for a retention window ending now.
pub(crate) fn retention_cutoff(retention_days: u32) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(i64::from(retention_days))
}

/// Map a "row not found" style miss onto the canonical error.
pub(crate) fn not_found(id: Uuid) -> StorageError {
    StorageError::NotFound { id: id.to_string() }
}
