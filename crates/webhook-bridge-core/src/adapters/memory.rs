//! In-memory execution storage for testing and storage-disabled mode.
//!
//! Fully implements the [`ExecutionStorage`] contract, including filter
//! semantics and retention cleanup, so tests exercise the same code paths
//! the SQLite adapter serves in production.

use crate::execution::{ExecutionFilter, ExecutionRecord, ExecutionStats};
use crate::storage::{not_found, retention_cutoff, ExecutionStorage, StorageInfo};
use crate::{StorageError, TrackingResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Thread-safe in-memory execution store.
#[derive(Default)]
pub struct InMemoryExecutionStorage {
    records: RwLock<HashMap<Uuid, ExecutionRecord>>,
    closed: AtomicBool,
}

impl InMemoryExecutionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> TrackingResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Collect matching records, newest first, before pagination.
    fn matching(&self, filter: &ExecutionFilter) -> Vec<ExecutionRecord> {
        let records = self.records.read().expect("execution store lock poisoned");
        let mut matched: Vec<ExecutionRecord> = records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matched
    }
}

#[async_trait]
impl ExecutionStorage for InMemoryExecutionStorage {
    async fn initialize(&self) -> TrackingResult<()> {
        self.check_open()
    }

    async fn save_execution(&self, record: &ExecutionRecord) -> TrackingResult<()> {
        self.check_open()?;
        let mut records = self.records.write().expect("execution store lock poisoned");
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> TrackingResult<ExecutionRecord> {
        self.check_open()?;
        let records = self.records.read().expect("execution store lock poisoned");
        records.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> TrackingResult<()> {
        self.check_open()?;
        let mut records = self.records.write().expect("execution store lock poisoned");
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(not_found(record.id)),
        }
    }

    async fn delete_execution(&self, id: Uuid) -> TrackingResult<()> {
        self.check_open()?;
        let mut records = self.records.write().expect("execution store lock poisoned");
        records.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn list_executions(&self, filter: &ExecutionFilter) -> TrackingResult<Vec<ExecutionRecord>> {
        self.check_open()?;
        let matched = self.matching(filter);
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_execution_stats(&self, filter: &ExecutionFilter) -> TrackingResult<ExecutionStats> {
        self.check_open()?;
        let matched = self.matching(filter);
        Ok(ExecutionStats::from_records(matched.iter()))
    }

    async fn cleanup_old_executions(&self, retention_days: u32) -> TrackingResult<u64> {
        self.check_open()?;
        let cutoff = retention_cutoff(retention_days);
        let mut records = self.records.write().expect("execution store lock poisoned");
        let before = records.len();
        records.retain(|_, record| record.start_time >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn storage_info(&self) -> TrackingResult<StorageInfo> {
        self.check_open()?;
        let records = self.records.read().expect("execution store lock poisoned");
        Ok(StorageInfo {
            backend: "memory".to_string(),
            location: None,
            record_count: records.len() as u64,
            oldest_record: records.values().map(|r| r.start_time).min(),
        })
    }

    async fn health_check(&self) -> TrackingResult<()> {
        self.check_open()
    }

    async fn close(&self) -> TrackingResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
