//! Error types for executor client operations.

use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Errors surfaced by the executor client.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Data-path call attempted while the client is not connected.
    #[error("executor client is not connected")]
    NotConnected,

    #[error("connect to {endpoint} failed: {message}")]
    ConnectFailed { endpoint: String, message: String },

    #[error("call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("rpc failed ({code:?}): {message}")]
    Rpc { code: tonic::Code, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("invalid executor endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("{sink} sink may only be set once")]
    SinkAlreadySet { sink: &'static str },
}

impl ExecutorError {
    /// Build from a gRPC status, unwrapping transport-level failures.
    pub fn from_status(status: tonic::Status) -> Self {
        Self::Rpc {
            code: status.code(),
            message: status.message().to_string(),
        }
    }

    /// Whether the failure warrants a reconnect-and-retry on the execute
    /// path.
    ///
    /// Connection-shaped failures (refused, reset, closed, unknown host,
    /// unreachable network) and any deadline expiry qualify; everything
    /// else propagates immediately.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::ConnectFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::Transport { .. } => true,
            Self::Rpc { code, message } => match code {
                tonic::Code::Unavailable | tonic::Code::DeadlineExceeded => true,
                _ => {
                    let lower = message.to_lowercase();
                    lower.contains("connection refused")
                        || lower.contains("connection reset")
                        || lower.contains("connection closed")
                        || lower.contains("no such host")
                        || lower.contains("network unreachable")
                        || lower.contains("broken pipe")
                }
            },
            Self::InvalidEndpoint { .. } => false,
            Self::SinkAlreadySet { .. } => false,
        }
    }

    /// Whether the failure means the plugin does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Rpc {
                code: tonic::Code::NotFound,
                ..
            }
        )
    }
}
