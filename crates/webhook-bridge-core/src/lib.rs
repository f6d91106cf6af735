//! # Webhook Bridge Core
//!
//! Core domain logic for the Webhook Bridge dispatch service.
//!
//! This crate contains the execution-tracking domain: the record types that
//! describe one plugin execution, the storage contract those records are
//! persisted through, the tracker that opens and closes execution spans, and
//! the in-memory metrics registry that aggregates outcomes.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - Storage failures never block plugin execution
//!
//! ## Usage
//!
//! ```rust
//! use webhook_bridge_core::{ErrorKind, ExecutionStatus};
//!
//! // Error classification is centralized here so every subsystem agrees
//! // on the failure taxonomy.
//! let kind = ErrorKind::classify("connection refused by executor");
//! assert_eq!(kind, ErrorKind::Connection);
//! assert_eq!(kind.terminal_status(), ExecutionStatus::Failed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use uuid::Uuid;

/// Standard result type for tracking operations
pub type TrackingResult<T> = Result<T, StorageError>;

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Closed set of failure categories used across the bridge.
///
/// Every failed, timed out, or canceled execution carries exactly one of
/// these tags. The set is closed on purpose: dashboards and retention
/// queries group by it, so ad-hoc categories would fragment history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call exceeded its deadline.
    Timeout,
    /// The executor endpoint could not be reached or dropped the link.
    Connection,
    /// The executor rejected the call as unauthorized.
    Permission,
    /// The plugin (or record) does not exist.
    NotFound,
    /// The inbound request failed validation before dispatch.
    Validation,
    /// The plugin itself reported a failure.
    Executor,
    /// A bridge-side fault (tracker, pool, panic recovery).
    Internal,
    /// The execution was canceled by shutdown or caller.
    Canceled,
}

impl ErrorKind {
    /// Stable string tag persisted in execution records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Executor => "executor",
            Self::Internal => "internal",
            Self::Canceled => "canceled",
        }
    }

    /// Classify a raw error message into a kind.
    ///
    /// First match wins. Matching is by substring today; when the RPC
    /// runtime exposes typed errors this is the single place to migrate.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("deadline exceeded") || lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("canceled") || lower.contains("cancelled") {
            Self::Canceled
        } else if lower.contains("connection")
            || lower.contains("unreachable")
            || lower.contains("no such host")
            || lower.contains("broken pipe")
        {
            Self::Connection
        } else if lower.contains("permission denied") || lower.contains("forbidden") {
            Self::Permission
        } else if lower.contains("not found") {
            Self::NotFound
        } else {
            Self::Executor
        }
    }

    /// Terminal execution status implied by this kind.
    ///
    /// Timeouts and cancellations get their own statuses; every other
    /// kind lands in `Failed` with the kind kept as the error tag.
    pub fn terminal_status(&self) -> ExecutionStatus {
        match self {
            Self::Timeout => ExecutionStatus::Timeout,
            Self::Canceled => ExecutionStatus::Canceled,
            _ => ExecutionStatus::Failed,
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection | Self::Executor | Self::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(Self::Timeout),
            "connection" => Ok(Self::Connection),
            "permission" => Ok(Self::Permission),
            "not_found" => Ok(Self::NotFound),
            "validation" => Ok(Self::Validation),
            "executor" => Ok(Self::Executor),
            "internal" => Ok(Self::Internal),
            "canceled" => Ok(Self::Canceled),
            other => Err(StorageError::Corrupt {
                message: format!("unknown error kind '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Storage Errors
// ============================================================================

/// Errors surfaced by execution storage implementations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("execution not found: {id}")]
    NotFound { id: String },

    #[error("storage connection failed: {message}")]
    Connection { message: String },

    #[error("storage query failed: {message}")]
    Query { message: String },

    #[error("storage initialization failed: {message}")]
    Initialization { message: String },

    #[error("stored record is corrupt: {message}")]
    Corrupt { message: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Check if the error is transient and a later call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::Connection { .. } => true,
            Self::Query { .. } => true,
            Self::Initialization { .. } => false,
            Self::Corrupt { .. } => false,
            Self::Serialization(_) => false,
            Self::Closed => false,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                id: "<unknown>".to_string(),
            },
            sqlx::Error::PoolClosed => Self::Closed,
            sqlx::Error::Io(e) => Self::Connection {
                message: e.to_string(),
            },
            other => Self::Query {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Execution record types and filters
pub mod execution;

/// Storage contract for execution history
pub mod storage;

/// Storage adapter implementations (SQLite, in-memory)
pub mod adapters;

/// Execution tracker: spans, truncation, cleanup
pub mod tracker;

/// In-memory rolling metrics registry
pub mod metrics;

// Re-export key types for convenience
pub use adapters::{InMemoryExecutionStorage, SqliteExecutionStorage};
pub use execution::{
    ExecutionFilter, ExecutionRecord, ExecutionRequest, ExecutionResult, ExecutionStats,
    ExecutionStatus, StatusCounts,
};
pub use metrics::{AggregateSnapshot, ErrorTypeCount, MetricsRegistry, PluginSnapshot};
pub use storage::{ExecutionStorage, StorageInfo};
pub use tracker::{ExecutionContext, ExecutionTracker, TrackerConfig, TRUNCATION_MARKER};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
