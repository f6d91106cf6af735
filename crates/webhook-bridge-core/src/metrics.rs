//! In-memory rolling metrics, per plugin and aggregate.
//!
//! Updates are applied under one registry lock so a reader always sees a
//! consistent snapshot of a single plugin. An aggregate across plugins may
//! interleave with concurrent updates; that is acceptable for dashboards.

use crate::execution::ExecutionStatus;
use crate::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

// ============================================================================
// Snapshots
// ============================================================================

/// Point-in-time metrics for one plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSnapshot {
    pub plugin_name: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeout: u64,
    /// successful / total, 0.0 - 1.0
    pub success_rate: f64,
    pub min_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    /// error-type tag -> occurrences
    pub error_types: HashMap<String, u64>,
}

/// Point-in-time metrics across all plugins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub plugins: u64,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeout: u64,
    pub success_rate: f64,
    pub min_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
}

/// One entry of the top-error-types ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTypeCount {
    pub error_type: String,
    pub count: u64,
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Default)]
struct PluginMetrics {
    total: u64,
    successful: u64,
    failed: u64,
    timeout: u64,
    total_duration_ns: u128,
    timed: u64,
    min_ns: Option<u64>,
    max_ns: u64,
    error_types: HashMap<String, u64>,
}

impl PluginMetrics {
    fn observe(&mut self, duration: Duration, status: ExecutionStatus, error_type: Option<ErrorKind>) {
        self.total += 1;
        match status {
            ExecutionStatus::Completed => self.successful += 1,
            ExecutionStatus::Timeout => self.timeout += 1,
            ExecutionStatus::Failed | ExecutionStatus::Canceled => self.failed += 1,
            ExecutionStatus::Pending | ExecutionStatus::Running => {}
        }
        if let Some(kind) = error_type {
            *self.error_types.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }

        let ns = duration.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.total_duration_ns += u128::from(ns);
        self.timed += 1;
        self.min_ns = Some(self.min_ns.map_or(ns, |m| m.min(ns)));
        self.max_ns = self.max_ns.max(ns);
    }

    fn snapshot(&self, plugin_name: &str) -> PluginSnapshot {
        let success_rate = if self.total > 0 {
            self.successful as f64 / self.total as f64
        } else {
            0.0
        };
        let avg_ns = if self.timed > 0 {
            self.total_duration_ns as f64 / self.timed as f64
        } else {
            0.0
        };
        PluginSnapshot {
            plugin_name: plugin_name.to_string(),
            total: self.total,
            successful: self.successful,
            failed: self.failed,
            timeout: self.timeout,
            success_rate,
            min_duration_ms: self.min_ns.unwrap_or(0) as f64 / 1_000_000.0,
            avg_duration_ms: avg_ns / 1_000_000.0,
            max_duration_ms: self.max_ns as f64 / 1_000_000.0,
            error_types: self.error_types.clone(),
        }
    }
}

/// Registry of per-plugin execution metrics.
///
/// Cheap to update on every completed execution; snapshots are computed on
/// read.
#[derive(Default)]
pub struct MetricsRegistry {
    plugins: RwLock<HashMap<String, PluginMetrics>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished execution.
    pub fn record_execution(
        &self,
        plugin_name: &str,
        duration: Duration,
        status: ExecutionStatus,
        error_type: Option<ErrorKind>,
    ) {
        let mut plugins = self.plugins.write().expect("metrics lock poisoned");
        plugins
            .entry(plugin_name.to_string())
            .or_default()
            .observe(duration, status, error_type);
    }

    /// Record an error observation without a full execution.
    ///
    /// Used for delivered-but-failing plugin responses (HTTP status >= 400
    /// from the executor): the execution record stays `completed`, but the
    /// error shows up in the plugin's error histogram.
    pub fn record_error(&self, plugin_name: &str, kind: ErrorKind) {
        let mut plugins = self.plugins.write().expect("metrics lock poisoned");
        let entry = plugins.entry(plugin_name.to_string()).or_default();
        *entry
            .error_types
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Snapshot one plugin, when it has been observed.
    pub fn plugin_snapshot(&self, plugin_name: &str) -> Option<PluginSnapshot> {
        let plugins = self.plugins.read().expect("metrics lock poisoned");
        plugins.get(plugin_name).map(|m| m.snapshot(plugin_name))
    }

    /// Snapshot every observed plugin, sorted by name.
    pub fn all_snapshots(&self) -> Vec<PluginSnapshot> {
        let plugins = self.plugins.read().expect("metrics lock poisoned");
        let mut snapshots: Vec<PluginSnapshot> = plugins
            .iter()
            .map(|(name, m)| m.snapshot(name))
            .collect();
        snapshots.sort_by(|a, b| a.plugin_name.cmp(&b.plugin_name));
        snapshots
    }

    /// Aggregate snapshot across all plugins.
    pub fn aggregate(&self) -> AggregateSnapshot {
        let plugins = self.plugins.read().expect("metrics lock poisoned");
        let mut agg = AggregateSnapshot {
            plugins: plugins.len() as u64,
            ..Default::default()
        };

        let mut total_duration_ns: u128 = 0;
        let mut timed: u64 = 0;
        let mut min_ns: Option<u64> = None;
        let mut max_ns: u64 = 0;

        for metrics in plugins.values() {
            agg.total += metrics.total;
            agg.successful += metrics.successful;
            agg.failed += metrics.failed;
            agg.timeout += metrics.timeout;
            total_duration_ns += metrics.total_duration_ns;
            timed += metrics.timed;
            if let Some(m) = metrics.min_ns {
                min_ns = Some(min_ns.map_or(m, |cur| cur.min(m)));
            }
            max_ns = max_ns.max(metrics.max_ns);
        }

        if agg.total > 0 {
            agg.success_rate = agg.successful as f64 / agg.total as f64;
        }
        if timed > 0 {
            agg.avg_duration_ms = total_duration_ns as f64 / timed as f64 / 1_000_000.0;
        }
        agg.min_duration_ms = min_ns.unwrap_or(0) as f64 / 1_000_000.0;
        agg.max_duration_ms = max_ns as f64 / 1_000_000.0;

        agg
    }

    /// The `k` most frequent error types across all plugins, descending.
    pub fn top_error_types(&self, k: usize) -> Vec<ErrorTypeCount> {
        let plugins = self.plugins.read().expect("metrics lock poisoned");
        let mut combined: HashMap<&str, u64> = HashMap::new();
        for metrics in plugins.values() {
            for (kind, count) in &metrics.error_types {
                *combined.entry(kind.as_str()).or_insert(0) += count;
            }
        }

        let mut ranked: Vec<ErrorTypeCount> = combined
            .into_iter()
            .map(|(error_type, count)| ErrorTypeCount {
                error_type: error_type.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.error_type.cmp(&b.error_type)));
        ranked.truncate(k);
        ranked
    }
}
