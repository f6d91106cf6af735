//! # Webhook Bridge Service
//!
//! HTTP dispatch service bridging inbound webhooks to the out-of-process
//! plugin executor.
//!
//! This service provides:
//! - `ANY /webhook/{plugin}` dispatch with payload normalization
//! - Health, execution history, metrics, and plugin listing endpoints
//! - Dual dispatch: an audited pool job per request plus a synchronous
//!   executor call for the user-visible response

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware;
use axum::response::{Json, Response};
use axum::routing::{any, get};
use axum::{Extension, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use executor_sdk::ExecutorClient;
use pool_runtime::{Job, PoolError, WorkerPool};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use webhook_bridge_core::{ExecutionFilter, ExecutionTracker};

pub mod config;
pub mod errors;
pub mod jobs;
pub mod normalize;
pub mod orchestrator;
pub mod responses;

pub use config::BridgeConfig;
pub use errors::{ApiError, ApiErrorCode};
pub use orchestrator::{BridgeRuntime, ServiceError};

use crate::jobs::WEBHOOK_JOB_TYPE;
use crate::normalize::{header_str, normalize_payload, request_meta, stringify_values, META_KEY};
use crate::responses::{
    ExecuteResultBody, ExecutionListParams, ExecutionListResponse, HealthResponse,
    MetricsResponse, PluginListParams, PluginListResponse, WebhookResponse,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: BridgeConfig,

    /// Client to the plugin executor
    pub executor: Arc<ExecutorClient>,

    /// Worker pool carrying the audited dispatch path
    pub pool: Arc<WorkerPool>,

    /// Execution tracker for history and metrics
    pub tracker: Arc<ExecutionTracker>,

    /// Service start time, for uptime reporting
    pub started_at: DateTime<Utc>,
}

/// Request id taken from `X-Request-ID` or generated, echoed on responses.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

// ============================================================================
// Router
// ============================================================================

/// Create the HTTP router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route("/webhook/{plugin}", any(handle_webhook));

    let health_routes = Router::new().route("/health", get(handle_health));

    let query_routes = Router::new()
        .route("/executions", get(list_executions))
        .route("/executions/{id}", get(get_execution))
        .route("/metrics", get(metrics_snapshot));

    let plugin_routes = Router::new()
        .route("/plugins", get(list_plugins))
        .route("/plugins/{plugin}", get(get_plugin));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(query_routes)
        .merge(plugin_routes)
        .fallback(not_found_fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .into_inner(),
        )
        .with_state(state)
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Dispatch one webhook request to its plugin.
///
/// The pool submission is the audited, retryable record of the request; the
/// synchronous executor call in the same handler produces the HTTP
/// response. Fail-fast checks (empty plugin, disconnected executor) happen
/// before either path starts.
#[instrument(skip(state, headers, body), fields(plugin = %plugin))]
async fn handle_webhook(
    State(state): State<AppState>,
    Path(plugin): Path<String>,
    method: Method,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let plugin = plugin.trim().to_string();
    if plugin.is_empty() {
        return Err(ApiError::validation("plugin name is required")
            .with_request_id(request_id.0.clone()));
    }
    let supported = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
    ];
    if !supported.contains(&method) {
        return Err(
            ApiError::validation(format!("unsupported method '{}'", method))
                .with_request_id(request_id.0.clone()),
        );
    }
    if !state.executor.is_connected() {
        return Err(ApiError::executor_unavailable().with_request_id(request_id.0.clone()));
    }

    // Normalize the payload and attach request metadata.
    let mut data = normalize_payload(&method, raw_query.as_deref(), &headers, &body);
    data.insert(
        META_KEY.to_string(),
        request_meta(&method, &headers, &request_id.0),
    );

    // Audited path: enqueue the webhook job. Backpressure surfaces here.
    let mut job_payload = HashMap::new();
    job_payload.insert("plugin".to_string(), Value::String(plugin.clone()));
    job_payload.insert("method".to_string(), Value::String(method.to_string()));
    job_payload.insert(
        "data".to_string(),
        Value::Object(data.clone().into_iter().collect()),
    );
    let job_id = state
        .pool
        .submit(Job::new(WEBHOOK_JOB_TYPE, job_payload))
        .map_err(|e| submit_error(e).with_request_id(request_id.0.clone()))?;

    // Response path: call the executor directly under its own deadline.
    let query_string = raw_query.unwrap_or_default();
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    match state
        .executor
        .execute(
            &plugin,
            method.as_str(),
            stringify_values(&data),
            header_map,
            &query_string,
        )
        .await
    {
        Ok(response) => {
            info!(
                job_id = %job_id,
                status_code = response.status_code,
                "Webhook dispatched"
            );
            Ok(Json(WebhookResponse {
                job_id,
                plugin,
                method: method.to_string(),
                result: ExecuteResultBody::from(response),
                timestamp: Utc::now(),
            }))
        }
        Err(e) if e.is_not_found() => Err(ApiError::new(
            ApiErrorCode::PluginNotFound,
            format!("plugin '{}' not found", plugin),
        )
        .with_request_id(request_id.0)),
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Webhook dispatch failed");
            Err(
                ApiError::new(ApiErrorCode::ExecutionFailed, e.to_string())
                    .with_request_id(request_id.0),
            )
        }
    }
}

fn submit_error(err: PoolError) -> ApiError {
    match err {
        PoolError::QueueFull { capacity } => ApiError::new(
            ApiErrorCode::QueueFull,
            format!("job queue is full (capacity {})", capacity),
        ),
        PoolError::ShuttingDown => {
            ApiError::new(ApiErrorCode::ShuttingDown, "service is shutting down")
        }
        PoolError::HandlerNotFound { job_type } => ApiError::new(
            ApiErrorCode::Internal,
            format!("no handler registered for '{}'", job_type),
        ),
        other => ApiError::new(ApiErrorCode::Internal, other.to_string()),
    }
}

// ============================================================================
// Health Handler
// ============================================================================

/// Report executor connectivity and pool counters. Always 200; the body
/// carries the degraded flag.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let executor_connected = state.executor.is_connected();
    let pool = state.pool.stats();
    let storage = state.tracker.storage().storage_info().await.ok();
    let status = if executor_connected && state.pool.is_running() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        executor_connected,
        pool,
        storage,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds().max(0) as u64,
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Execution Query Handlers
// ============================================================================

/// List execution records matching the query filters.
async fn list_executions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<ExecutionListParams>,
) -> Result<Json<ExecutionListResponse>, ApiError> {
    let mut filter = ExecutionFilter {
        plugin_name: params.plugin,
        trace_id: params.trace_id,
        limit: Some(params.limit.unwrap_or(100).min(1000)),
        offset: params.offset,
        ..Default::default()
    };
    if let Some(ref status) = params.status {
        filter.status = Some(status.parse().map_err(|_| {
            ApiError::validation(format!("unknown status '{}'", status))
                .with_request_id(request_id.0.clone())
        })?);
    }
    if let Some(ref kind) = params.error_type {
        filter.error_type = Some(kind.parse().map_err(|_| {
            ApiError::validation(format!("unknown error type '{}'", kind))
                .with_request_id(request_id.0.clone())
        })?);
    }

    let executions = state
        .tracker
        .storage()
        .list_executions(&filter)
        .await
        .map_err(|e| {
            ApiError::new(ApiErrorCode::StorageError, e.to_string()).with_request_id(request_id.0)
        })?;

    Ok(Json(ExecutionListResponse {
        count: executions.len(),
        executions,
    }))
}

/// Fetch one execution record by id.
async fn get_execution(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<webhook_bridge_core::ExecutionRecord>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| {
        ApiError::validation(format!("invalid execution id '{}'", id))
            .with_request_id(request_id.0.clone())
    })?;

    match state.tracker.storage().get_execution(id).await {
        Ok(record) => Ok(Json(record)),
        Err(webhook_bridge_core::StorageError::NotFound { id }) => Err(ApiError::new(
            ApiErrorCode::NotFound,
            format!("execution '{}' not found", id),
        )
        .with_request_id(request_id.0)),
        Err(e) => Err(
            ApiError::new(ApiErrorCode::StorageError, e.to_string())
                .with_request_id(request_id.0),
        ),
    }
}

/// Tracker metrics snapshot: aggregate, per-plugin, top error types.
async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsResponse> {
    let metrics = state.tracker.metrics();
    Json(MetricsResponse {
        aggregate: metrics.aggregate(),
        plugins: metrics.all_snapshots(),
        top_error_types: metrics.top_error_types(5),
    })
}

// ============================================================================
// Plugin Handlers (executor passthrough, no retry)
// ============================================================================

async fn list_plugins(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<PluginListParams>,
) -> Result<Json<PluginListResponse>, ApiError> {
    if !state.executor.is_connected() {
        return Err(ApiError::executor_unavailable().with_request_id(request_id.0));
    }

    let listed = state
        .executor
        .list_plugins(params.filter.as_deref().unwrap_or(""))
        .await
        .map_err(|e| {
            ApiError::new(ApiErrorCode::ExecutionFailed, e.to_string())
                .with_request_id(request_id.0)
        })?;

    Ok(Json(PluginListResponse {
        total_count: listed.total_count,
        plugins: listed.plugins.into_iter().map(Into::into).collect(),
    }))
}

async fn get_plugin(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(plugin): Path<String>,
) -> Result<Json<responses::PluginInfoBody>, ApiError> {
    if !state.executor.is_connected() {
        return Err(ApiError::executor_unavailable().with_request_id(request_id.0));
    }

    let response = state.executor.get_plugin_info(&plugin).await.map_err(|e| {
        ApiError::new(ApiErrorCode::ExecutionFailed, e.to_string())
            .with_request_id(request_id.0.clone())
    })?;

    match response.plugin {
        Some(info) if response.found => Ok(Json(info.into())),
        _ => Err(ApiError::new(
            ApiErrorCode::PluginNotFound,
            format!("plugin '{}' not found", plugin),
        )
        .with_request_id(request_id.0)),
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Honor `X-Request-ID` or generate one, expose it to handlers, and echo it
/// on the response.
async fn request_id_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let request_id = header_str(request.headers(), "x-request-id")
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Fallback for unknown paths, in the standard envelope.
async fn not_found_fallback() -> ApiError {
    ApiError::new(ApiErrorCode::NotFound, "resource not found")
}
