//! Graceful shutdown scenarios: in-flight work settles, nothing is left
//! marked running.

mod common;

use common::{start_bridge_with, test_config, FakeExecutor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use webhook_bridge_core::ExecutionStatus;

fn webhook_job() -> pool_runtime::Job {
    let mut payload = HashMap::new();
    payload.insert("plugin".to_string(), json!("echo"));
    payload.insert("method".to_string(), json!("POST"));
    payload.insert("data".to_string(), json!({"msg": "hi"}));
    pool_runtime::Job::new("webhook", payload)
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_job_to_complete() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let mut config = test_config();
    config.worker.count = 1;
    let bridge = start_bridge_with(FakeExecutor::gated(gate.clone()), config).await;

    bridge.runtime.state.pool.submit(webhook_job()).unwrap();
    for _ in 0..400 {
        if bridge.runtime.state.pool.stats().active_workers == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Release the in-flight handler shortly after shutdown begins.
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.add_permits(64);
    });

    let storage = bridge.storage();
    let pool = bridge.runtime.state.pool.clone();
    bridge.runtime.shutdown().await;
    release.await.unwrap();

    // The in-flight job finished rather than being dropped.
    assert_eq!(pool.stats().completed, 1);
    assert_eq!(pool.stats().active_workers, 0);

    // No record remains in a non-terminal state after shutdown returns.
    let records = storage
        .list_executions(&Default::default())
        .await
        .expect("storage remains readable");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn shutdown_settles_timed_out_handler_as_terminal() {
    // The gate is never released: the handler rides the executor call
    // timeout and the record must still end terminal.
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let mut config = test_config();
    config.worker.count = 1;
    config.executor.timeout_seconds = 1;
    config.worker.job_timeout_seconds = 3;
    let bridge = start_bridge_with(FakeExecutor::gated(gate), config).await;

    bridge.runtime.state.pool.submit(webhook_job()).unwrap();
    for _ in 0..400 {
        if bridge.runtime.state.pool.stats().active_workers == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let storage = bridge.storage();
    bridge.runtime.shutdown().await;

    let records = storage
        .list_executions(&Default::default())
        .await
        .expect("storage remains readable");
    assert!(!records.is_empty());
    for record in &records {
        assert!(
            record.status.is_terminal(),
            "record {} left in {:?}",
            record.id,
            record.status
        );
        assert!(record.end_time.is_some());
    }
}

#[tokio::test]
async fn submissions_after_shutdown_are_rejected() {
    let bridge = start_bridge_with(FakeExecutor::default(), test_config()).await;

    let pool = bridge.runtime.state.pool.clone();
    bridge.runtime.shutdown().await;

    let err = pool.submit(webhook_job()).unwrap_err();
    assert!(matches!(err, pool_runtime::PoolError::ShuttingDown));
}
