//! Tests for the in-memory execution storage adapter.

use super::*;
use crate::execution::{ExecutionRequest, ExecutionStatus};
use chrono::{Duration as ChronoDuration, Utc};

fn record_for(plugin: &str) -> ExecutionRecord {
    ExecutionRecord::begin(&ExecutionRequest::new(plugin, "POST"))
}

#[tokio::test]
async fn save_then_get_returns_identical_record() {
    let storage = InMemoryExecutionStorage::new();
    storage.initialize().await.unwrap();
    let record = record_for("echo");

    storage.save_execution(&record).await.unwrap();
    let fetched = storage.get_execution(record.id).await.unwrap();

    assert_eq!(fetched, record);
}

#[tokio::test]
async fn get_missing_record_is_not_found() {
    let storage = InMemoryExecutionStorage::new();

    let err = storage.get_execution(Uuid::new_v4()).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
    let storage = InMemoryExecutionStorage::new();
    let record = record_for("echo");

    let err = storage.update_execution(&record).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn update_replaces_existing_record() {
    let storage = InMemoryExecutionStorage::new();
    let mut record = record_for("echo");
    storage.save_execution(&record).await.unwrap();

    record.status = ExecutionStatus::Completed;
    record.end_time = Some(Utc::now());
    storage.update_execution(&record).await.unwrap();

    let fetched = storage.get_execution(record.id).await.unwrap();
    assert_eq!(fetched.status, ExecutionStatus::Completed);
    assert!(fetched.end_time.is_some());
}

#[tokio::test]
async fn delete_removes_record() {
    let storage = InMemoryExecutionStorage::new();
    let record = record_for("echo");
    storage.save_execution(&record).await.unwrap();

    storage.delete_execution(record.id).await.unwrap();

    let err = storage.get_execution(record.id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn list_filters_by_plugin_and_paginates() {
    let storage = InMemoryExecutionStorage::new();
    for _ in 0..3 {
        storage.save_execution(&record_for("echo")).await.unwrap();
    }
    storage.save_execution(&record_for("transform")).await.unwrap();

    let all_echo = storage
        .list_executions(&ExecutionFilter::for_plugin("echo"))
        .await
        .unwrap();
    assert_eq!(all_echo.len(), 3);

    let mut page = ExecutionFilter::for_plugin("echo");
    page.limit = Some(2);
    page.offset = Some(2);
    let last_page = storage.list_executions(&page).await.unwrap();
    assert_eq!(last_page.len(), 1);
}

#[tokio::test]
async fn list_returns_newest_first() {
    let storage = InMemoryExecutionStorage::new();
    let mut older = record_for("echo");
    older.start_time = Utc::now() - ChronoDuration::minutes(5);
    let newer = record_for("echo");
    storage.save_execution(&older).await.unwrap();
    storage.save_execution(&newer).await.unwrap();

    let listed = storage
        .list_executions(&ExecutionFilter::default())
        .await
        .unwrap();

    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
}

#[tokio::test]
async fn cleanup_removes_only_expired_records() {
    let storage = InMemoryExecutionStorage::new();
    let mut expired = record_for("echo");
    expired.start_time = Utc::now() - ChronoDuration::days(10);
    let fresh = record_for("echo");
    storage.save_execution(&expired).await.unwrap();
    storage.save_execution(&fresh).await.unwrap();

    let removed = storage.cleanup_old_executions(7).await.unwrap();

    assert_eq!(removed, 1);
    assert!(storage.get_execution(fresh.id).await.is_ok());
    assert!(storage.get_execution(expired.id).await.is_err());
}

#[tokio::test]
async fn storage_info_reports_counts() {
    let storage = InMemoryExecutionStorage::new();
    storage.save_execution(&record_for("echo")).await.unwrap();

    let info = storage.storage_info().await.unwrap();

    assert_eq!(info.backend, "memory");
    assert_eq!(info.record_count, 1);
    assert!(info.oldest_record.is_some());
}

#[tokio::test]
async fn close_is_idempotent_and_rejects_further_writes() {
    let storage = InMemoryExecutionStorage::new();

    storage.close().await.unwrap();
    storage.close().await.unwrap();

    let err = storage.save_execution(&record_for("echo")).await.unwrap_err();
    assert!(matches!(err, StorageError::Closed));
}
