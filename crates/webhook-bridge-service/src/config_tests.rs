//! Tests for configuration loading and validation.

use super::*;

#[test]
fn defaults_are_runnable() {
    let config = BridgeConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.executor.host, "127.0.0.1");
    assert_eq!(config.executor.port, 50051);
    assert_eq!(config.executor.timeout_seconds, 30);
    assert_eq!(config.executor.max_retries, 3);
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.storage.backend, "sqlite");
    assert_eq!(config.storage.retention_days, 30);
    assert!(config.execution_tracking.enabled);
    assert_eq!(config.execution_tracking.max_input_size, 1024 * 1024);
    assert_eq!(config.worker.queue_size, 1000);
    assert_eq!(config.worker.job_timeout_seconds, 30);
}

#[test]
fn client_config_converts_seconds() {
    let config = ExecutorConfig::default();

    let client = config.client_config();

    assert_eq!(client.call_timeout, Duration::from_secs(30));
    assert_eq!(client.connect_timeout, Duration::from_secs(10));
    assert_eq!(client.max_retries, 3);
    assert_eq!(client.endpoint(), "http://127.0.0.1:50051");
}

#[test]
fn pool_config_converts_fields() {
    let config = WorkerConfig {
        count: 4,
        queue_size: 50,
        job_timeout_seconds: 10,
        max_retries: 2,
    };

    let pool = config.pool_config();

    assert_eq!(pool.worker_count, 4);
    assert_eq!(pool.queue_capacity, 50);
    assert_eq!(pool.job_timeout, Duration::from_secs(10));
    assert_eq!(pool.default_max_attempts, 2);
}

#[test]
fn tracker_config_converts_interval_and_retention() {
    let tracking = TrackingConfig {
        cleanup_interval_hours: 6,
        ..Default::default()
    };

    let tracker = tracking.tracker_config(14);

    assert_eq!(tracker.cleanup_interval, Duration::from_secs(6 * 60 * 60));
    assert_eq!(tracker.retention_days, 14);
    assert!(tracker.enabled);
}

#[test]
fn zero_port_is_rejected() {
    let mut config = BridgeConfig::default();
    config.server.port = 0;

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn unknown_storage_backend_is_rejected() {
    let mut config = BridgeConfig::default();
    config.storage.backend = "postgres".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn sqlite_requires_a_path() {
    let mut config = BridgeConfig::default();
    config.storage.path = "  ".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn zero_queue_size_is_rejected() {
    let mut config = BridgeConfig::default();
    config.worker.queue_size = 0;

    assert!(config.validate().is_err());
}

#[test]
fn config_parses_from_toml() {
    let toml_text = r#"
        [executor]
        host = "executor.internal"
        port = 9090
        timeout = 15

        [server]
        port = 8080

        [storage]
        type = "memory"

        [execution_tracking]
        track_input = false

        [worker]
        count = 8
        queue_size = 64
    "#;

    let config: BridgeConfig = toml::from_str(toml_text).expect("toml parses");

    assert_eq!(config.executor.host, "executor.internal");
    assert_eq!(config.executor.port, 9090);
    assert_eq!(config.executor.timeout_seconds, 15);
    // Unset fields keep their defaults.
    assert_eq!(config.executor.max_retries, 3);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.storage.backend, "memory");
    assert!(!config.execution_tracking.track_input);
    assert!(config.execution_tracking.track_output);
    assert_eq!(config.worker.count, 8);
    assert_eq!(config.worker.queue_size, 64);
}

#[test]
fn load_accepts_missing_file_with_defaults() {
    // No file, no overrides: defaults must validate and load.
    let config = BridgeConfig::load(None).expect("defaults load");
    assert_eq!(config.server.port, 8000);
}
