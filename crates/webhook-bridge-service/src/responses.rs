//! Response types and query parameters for the HTTP API.

use chrono::{DateTime, Utc};
use executor_sdk::{ExecutePluginResponse, PluginInfo};
use pool_runtime::PoolStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use webhook_bridge_core::{
    AggregateSnapshot, ErrorTypeCount, ExecutionRecord, PluginSnapshot, StorageInfo,
};

// ============================================================================
// Webhook
// ============================================================================

/// Successful webhook dispatch response.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub job_id: String,
    pub plugin: String,
    pub method: String,
    pub result: ExecuteResultBody,
    pub timestamp: DateTime<Utc>,
}

/// Executor response fields surfaced to the HTTP caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResultBody {
    pub status_code: i32,
    pub message: String,
    pub data: HashMap<String, String>,
    pub error: String,
    /// Executor-side wall clock, seconds
    pub execution_time: f64,
}

impl From<ExecutePluginResponse> for ExecuteResultBody {
    fn from(response: ExecutePluginResponse) -> Self {
        Self {
            status_code: response.status_code,
            message: response.message,
            data: response.data,
            error: response.error,
            execution_time: response.execution_time,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub executor_connected: bool,
    pub pool: PoolStats,
    /// Backend description; absent when the store is unreachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageInfo>,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Execution queries
// ============================================================================

/// Parameters for execution listing.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionListParams {
    pub plugin: Option<String>,
    pub status: Option<String>,
    pub error_type: Option<String>,
    pub trace_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Execution listing response.
#[derive(Debug, Serialize)]
pub struct ExecutionListResponse {
    pub executions: Vec<ExecutionRecord>,
    pub count: usize,
}

/// Tracker metrics snapshot response.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub aggregate: AggregateSnapshot,
    pub plugins: Vec<PluginSnapshot>,
    pub top_error_types: Vec<ErrorTypeCount>,
}

// ============================================================================
// Plugins
// ============================================================================

/// Parameters for plugin listing.
#[derive(Debug, Default, Deserialize)]
pub struct PluginListParams {
    pub filter: Option<String>,
}

/// Serializable mirror of the executor's plugin descriptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginInfoBody {
    pub name: String,
    pub path: String,
    pub description: String,
    pub supported_methods: Vec<String>,
    pub is_available: bool,
    pub last_modified: String,
}

impl From<PluginInfo> for PluginInfoBody {
    fn from(info: PluginInfo) -> Self {
        Self {
            name: info.name,
            path: info.path,
            description: info.description,
            supported_methods: info.supported_methods,
            is_available: info.is_available,
            last_modified: info.last_modified,
        }
    }
}

/// Plugin listing response.
#[derive(Debug, Serialize)]
pub struct PluginListResponse {
    pub plugins: Vec<PluginInfoBody>,
    pub total_count: i32,
}
