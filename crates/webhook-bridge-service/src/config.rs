//! Configuration types for the bridge service.
//!
//! Every section deserializes with full defaults so an empty file (or no
//! file at all) yields a runnable configuration. Environment variables
//! prefixed `WEBHOOK_BRIDGE__` override file values, e.g.
//! `WEBHOOK_BRIDGE__SERVER__PORT=9000`.

use executor_sdk::ExecutorClientConfig;
use pool_runtime::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use webhook_bridge_core::TrackerConfig;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Executor RPC endpoint and retry settings
    pub executor: ExecutorConfig,

    /// HTTP listener settings
    pub server: ServerConfig,

    /// Execution history storage
    pub storage: StorageConfig,

    /// Execution tracking behavior
    pub execution_tracking: TrackingConfig,

    /// Worker pool sizing
    pub worker: WorkerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("WEBHOOK_BRIDGE").separator("__"),
        );

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate cross-field consistency. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.executor.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "executor.timeout must be at least one second".to_string(),
            });
        }
        if self.worker.queue_size == 0 {
            return Err(ConfigError::Invalid {
                message: "worker.queue_size must be at least 1".to_string(),
            });
        }
        if self.worker.job_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "worker.job_timeout must be at least one second".to_string(),
            });
        }
        match self.storage.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::Invalid {
                    message: format!("unsupported storage.type '{}'", other),
                });
            }
        }
        if self.storage.backend == "sqlite" && self.storage.path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "storage.path is required for the sqlite backend".to_string(),
            });
        }
        if self.storage.retention_days == 0 {
            return Err(ConfigError::Invalid {
                message: "storage.retention_days must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Executor RPC settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub host: String,
    pub port: u16,

    /// Per-call deadline, seconds
    #[serde(rename = "timeout")]
    pub timeout_seconds: u64,

    /// Dial ceiling, seconds
    pub connect_timeout_seconds: u64,

    /// Reconnect attempts per execute call
    pub max_retries: u32,

    /// Spawning the executor at boot is handled by deployment tooling, not
    /// this service; the flag is accepted so shared config files parse.
    pub auto_start: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_retries: 3,
            auto_start: false,
        }
    }
}

impl ExecutorConfig {
    pub fn client_config(&self) -> ExecutorClientConfig {
        ExecutorClientConfig {
            host: self.host.clone(),
            port: self.port,
            call_timeout: Duration::from_secs(self.timeout_seconds),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// "release" or "debug"; debug turns up request logging
    pub mode: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            mode: "release".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Execution history storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(rename = "type")]
    pub backend: String,

    /// Database file location for the sqlite backend
    pub path: String,

    pub retention_days: u32,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: "data/executions.db".to_string(),
            retention_days: 30,
            max_connections: 5,
        }
    }
}

// ============================================================================
// Tracking
// ============================================================================

/// Execution tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub enabled: bool,
    pub track_input: bool,
    pub track_output: bool,
    pub max_input_size: usize,
    pub max_output_size: usize,
    pub cleanup_interval_hours: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_input: true,
            track_output: true,
            max_input_size: 1024 * 1024,
            max_output_size: 1024 * 1024,
            cleanup_interval_hours: 24,
        }
    }
}

impl TrackingConfig {
    pub fn tracker_config(&self, retention_days: u32) -> TrackerConfig {
        TrackerConfig {
            enabled: self.enabled,
            track_input: self.track_input,
            track_output: self.track_output,
            max_input_size: self.max_input_size,
            max_output_size: self.max_output_size,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_hours * 60 * 60),
            retention_days,
        }
    }
}

// ============================================================================
// Worker pool
// ============================================================================

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker count; 0 means one per CPU
    pub count: usize,

    pub queue_size: usize,

    #[serde(rename = "job_timeout")]
    pub job_timeout_seconds: u64,

    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 0,
            queue_size: 1000,
            job_timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

impl WorkerConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.count,
            queue_capacity: self.queue_size,
            job_timeout: Duration::from_secs(self.job_timeout_seconds),
            default_max_attempts: self.max_retries.max(1),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
