//! HTTP-facing error type and the standard failure envelope.
//!
//! Every user-visible failure is a `{success:false, error:{code, message,
//! details}, timestamp, request_id}` body with a status code derived from
//! the error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

/// Machine-readable error codes surfaced to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    Validation,
    ExecutorUnavailable,
    QueueFull,
    ShuttingDown,
    PluginNotFound,
    NotFound,
    ExecutionFailed,
    StorageError,
    Internal,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::ExecutorUnavailable => "EXECUTOR_UNAVAILABLE",
            Self::QueueFull => "QUEUE_FULL",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::PluginNotFound => "PLUGIN_NOT_FOUND",
            Self::NotFound => "NOT_FOUND",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::StorageError => "STORAGE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::ExecutorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            // Queue saturation is surfaced as a server error with a
            // distinguishable code so callers can tell it from a plugin
            // failure.
            Self::QueueFull => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::PluginNotFound => StatusCode::NOT_FOUND,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ExecutionFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An HTTP handler failure carrying the standard envelope fields.
#[derive(Debug)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            request_id: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Validation, message)
    }

    pub fn executor_unavailable() -> Self {
        Self::new(
            ApiErrorCode::ExecutorUnavailable,
            "plugin executor is not connected",
        )
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
    timestamp: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                details: self.details,
            },
            timestamp: Utc::now(),
            request_id: self.request_id,
        };
        (status, Json(body)).into_response()
    }
}
