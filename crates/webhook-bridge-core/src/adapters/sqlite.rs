//! SQLite-backed execution storage.
//!
//! One `executions` table keyed by id, with indexes on
//! `(plugin_name, start_time)`, `(status)`, and `(trace_id)` to serve the
//! dashboard queries. Tag constraints are applied in process after the row
//! fetch; everything else is pushed into SQL.

use crate::execution::{ExecutionFilter, ExecutionRecord, ExecutionStats, ExecutionStatus};
use crate::storage::{not_found, retention_cutoff, ExecutionStorage, StorageInfo};
use crate::{ErrorKind, StorageError, TrackingResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS executions (
    id            TEXT PRIMARY KEY,
    plugin_name   TEXT NOT NULL,
    http_method   TEXT NOT NULL,
    status        TEXT NOT NULL,
    start_time    TEXT NOT NULL,
    end_time      TEXT,
    duration_ns   INTEGER,
    input         TEXT,
    output        TEXT,
    error_message TEXT,
    error_type    TEXT,
    attempts      INTEGER NOT NULL DEFAULT 1,
    retry_count   INTEGER NOT NULL DEFAULT 0,
    trace_id      TEXT,
    user_agent    TEXT,
    remote_ip     TEXT,
    tags          TEXT NOT NULL DEFAULT '{}',
    metadata      TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_executions_plugin_start ON executions (plugin_name, start_time);
CREATE INDEX IF NOT EXISTS idx_executions_status ON executions (status);
CREATE INDEX IF NOT EXISTS idx_executions_trace ON executions (trace_id);
"#;

/// Execution storage backed by an embedded SQLite database.
pub struct SqliteExecutionStorage {
    pool: SqlitePool,
    path: String,
}

impl SqliteExecutionStorage {
    /// Open (creating if missing) the database at `path`.
    pub async fn connect(path: impl AsRef<Path>, max_connections: u32) -> TrackingResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Initialization {
                    message: format!("create {}: {}", parent.display(), e),
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self {
            pool,
            path: path.display().to_string(),
        })
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ExecutionFilter) {
        if let Some(ref plugin) = filter.plugin_name {
            qb.push(" AND plugin_name = ");
            qb.push_bind(plugin.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(kind) = filter.error_type {
            qb.push(" AND error_type = ");
            qb.push_bind(kind.as_str());
        }
        if let Some(ref trace_id) = filter.trace_id {
            qb.push(" AND trace_id = ");
            qb.push_bind(trace_id.clone());
        }
        if let Some(after) = filter.started_after {
            qb.push(" AND start_time >= ");
            qb.push_bind(after);
        }
        if let Some(before) = filter.started_before {
            qb.push(" AND start_time <= ");
            qb.push_bind(before);
        }
    }

    /// Fetch all rows matching the SQL-expressible part of the filter, then
    /// apply tag constraints in process.
    async fn fetch_matching(&self, filter: &ExecutionFilter) -> TrackingResult<Vec<ExecutionRecord>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM executions WHERE 1=1");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY start_time DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            if filter.tags.is_empty() || filter.tags.iter().all(|(k, v)| record.tags.get(k) == Some(v)) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ExecutionStorage for SqliteExecutionStorage {
    async fn initialize(&self) -> TrackingResult<()> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn save_execution(&self, record: &ExecutionRecord) -> TrackingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (
                id, plugin_name, http_method, status, start_time, end_time,
                duration_ns, input, output, error_message, error_type,
                attempts, retry_count, trace_id, user_agent, remote_ip,
                tags, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.plugin_name)
        .bind(&record.http_method)
        .bind(record.status.as_str())
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.duration_ns)
        .bind(&record.input)
        .bind(&record.output)
        .bind(&record.error_message)
        .bind(record.error_type.map(|k| k.as_str()))
        .bind(record.attempts as i64)
        .bind(record.retry_count as i64)
        .bind(&record.trace_id)
        .bind(&record.user_agent)
        .bind(&record.remote_ip)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> TrackingResult<ExecutionRecord> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_record(&row),
            None => Err(not_found(id)),
        }
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> TrackingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions SET
                plugin_name = ?, http_method = ?, status = ?, start_time = ?,
                end_time = ?, duration_ns = ?, input = ?, output = ?,
                error_message = ?, error_type = ?, attempts = ?, retry_count = ?,
                trace_id = ?, user_agent = ?, remote_ip = ?, tags = ?,
                metadata = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.plugin_name)
        .bind(&record.http_method)
        .bind(record.status.as_str())
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.duration_ns)
        .bind(&record.input)
        .bind(&record.output)
        .bind(&record.error_message)
        .bind(record.error_type.map(|k| k.as_str()))
        .bind(record.attempts as i64)
        .bind(record.retry_count as i64)
        .bind(&record.trace_id)
        .bind(&record.user_agent)
        .bind(&record.remote_ip)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.updated_at)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(record.id));
        }
        Ok(())
    }

    async fn delete_execution(&self, id: Uuid) -> TrackingResult<()> {
        let result = sqlx::query("DELETE FROM executions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn list_executions(&self, filter: &ExecutionFilter) -> TrackingResult<Vec<ExecutionRecord>> {
        let matched = self.fetch_matching(filter).await?;
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_execution_stats(&self, filter: &ExecutionFilter) -> TrackingResult<ExecutionStats> {
        let matched = self.fetch_matching(filter).await?;
        Ok(ExecutionStats::from_records(matched.iter()))
    }

    async fn cleanup_old_executions(&self, retention_days: u32) -> TrackingResult<u64> {
        let cutoff = retention_cutoff(retention_days);
        let result = sqlx::query("DELETE FROM executions WHERE start_time < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn storage_info(&self) -> TrackingResult<StorageInfo> {
        let row = sqlx::query("SELECT COUNT(*) AS count, MIN(start_time) AS oldest FROM executions")
            .fetch_one(&self.pool)
            .await?;
        let record_count: i64 = row.try_get("count").map_err(StorageError::from)?;
        let oldest_record: Option<DateTime<Utc>> =
            row.try_get("oldest").map_err(StorageError::from)?;
        Ok(StorageInfo {
            backend: "sqlite".to_string(),
            location: Some(self.path.clone()),
            record_count: record_count.max(0) as u64,
            oldest_record,
        })
    }

    async fn health_check(&self) -> TrackingResult<()> {
        if self.pool.is_closed() {
            return Err(StorageError::Closed);
        }
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> TrackingResult<()> {
        // SqlitePool::close is idempotent.
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> TrackingResult<ExecutionRecord> {
    let id_text: String = row.try_get("id").map_err(StorageError::from)?;
    let id = Uuid::parse_str(&id_text).map_err(|e| StorageError::Corrupt {
        message: format!("invalid execution id '{}': {}", id_text, e),
    })?;

    let status_text: String = row.try_get("status").map_err(StorageError::from)?;
    let status: ExecutionStatus = status_text.parse()?;

    let error_type_text: Option<String> = row.try_get("error_type").map_err(StorageError::from)?;
    let error_type: Option<ErrorKind> = match error_type_text {
        Some(text) => Some(text.parse()?),
        None => None,
    };

    let tags_text: String = row.try_get("tags").map_err(StorageError::from)?;
    let metadata_text: String = row.try_get("metadata").map_err(StorageError::from)?;
    let tags: HashMap<String, String> = serde_json::from_str(&tags_text)?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_text)?;

    let attempts: i64 = row.try_get("attempts").map_err(StorageError::from)?;
    let retry_count: i64 = row.try_get("retry_count").map_err(StorageError::from)?;

    Ok(ExecutionRecord {
        id,
        plugin_name: row.try_get("plugin_name").map_err(StorageError::from)?,
        http_method: row.try_get("http_method").map_err(StorageError::from)?,
        status,
        start_time: row.try_get("start_time").map_err(StorageError::from)?,
        end_time: row.try_get("end_time").map_err(StorageError::from)?,
        duration_ns: row.try_get("duration_ns").map_err(StorageError::from)?,
        input: row.try_get("input").map_err(StorageError::from)?,
        output: row.try_get("output").map_err(StorageError::from)?,
        error_message: row.try_get("error_message").map_err(StorageError::from)?,
        error_type,
        attempts: attempts.max(1) as u32,
        retry_count: retry_count.max(0) as u32,
        trace_id: row.try_get("trace_id").map_err(StorageError::from)?,
        user_agent: row.try_get("user_agent").map_err(StorageError::from)?,
        remote_ip: row.try_get("remote_ip").map_err(StorageError::from)?,
        tags,
        metadata,
        created_at: row.try_get("created_at").map_err(StorageError::from)?,
        updated_at: row.try_get("updated_at").map_err(StorageError::from)?,
    })
}
