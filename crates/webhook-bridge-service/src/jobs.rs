//! Pool job handlers: the audited webhook delivery path and the executor
//! health probe.

use crate::normalize::{stringify_values, META_KEY};
use async_trait::async_trait;
use executor_sdk::{ExecutorClient, StatsSink};
use pool_runtime::{Job, JobContext, JobError, JobHandler, JobResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use webhook_bridge_core::{
    ErrorKind, ExecutionRequest, ExecutionResult, ExecutionTracker, MetricsRegistry,
};

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;

/// Job type tag for webhook deliveries.
pub const WEBHOOK_JOB_TYPE: &str = "webhook";

/// Job type tag for executor health probes.
pub const HEALTH_CHECK_JOB_TYPE: &str = "health_check";

// ============================================================================
// Webhook handler
// ============================================================================

/// Handles "webhook" jobs: opens a tracker span, calls the executor, closes
/// the span with the outcome.
///
/// A non-2xx plugin response is a successful delivery of a failing plugin
/// and never triggers a pool retry; transient RPC failures propagate so the
/// pool's attempt budget applies.
pub struct WebhookJobHandler {
    executor: Arc<ExecutorClient>,
    tracker: Arc<ExecutionTracker>,
}

impl WebhookJobHandler {
    pub fn new(executor: Arc<ExecutorClient>, tracker: Arc<ExecutionTracker>) -> Self {
        Self { executor, tracker }
    }

    fn build_request(job: &Job, plugin: &str, method: &str, data: &HashMap<String, Value>) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(plugin, method)
            .with_input(data.clone())
            .with_attempt(job.attempts);

        if let Some(meta) = data.get(META_KEY) {
            if let Some(request_id) = meta.get("request_id").and_then(Value::as_str) {
                request = request.with_trace_id(request_id);
            }
            if let Some(user_agent) = meta.get("user_agent").and_then(Value::as_str) {
                request = request.with_user_agent(user_agent);
            }
            if let Some(client_ip) = meta.get("client_ip").and_then(Value::as_str) {
                request = request.with_remote_ip(client_ip);
            }
        }
        request
    }
}

#[async_trait]
impl JobHandler for WebhookJobHandler {
    fn job_type(&self) -> &str {
        WEBHOOK_JOB_TYPE
    }

    async fn handle(&self, _ctx: &JobContext, job: &mut Job) -> Result<(), JobError> {
        let plugin = job
            .payload
            .get("plugin")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| JobError::new("webhook job payload missing 'plugin'"))?;
        let method = job
            .payload
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("POST")
            .to_string();
        let data: HashMap<String, Value> = match job.payload.get("data") {
            Some(Value::Object(object)) => object
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => HashMap::new(),
        };

        let request = Self::build_request(job, &plugin, &method, &data);
        let span = self.tracker.start_execution(&request).await;

        // The RPC runs under the client's own deadline even if the job was
        // canceled mid-flight, so a slow executor call is never leaked.
        let outcome = self
            .executor
            .execute(
                &plugin,
                &method,
                stringify_values(&data),
                HashMap::new(),
                "",
            )
            .await;

        match outcome {
            Ok(response) => {
                let mut result_data = HashMap::new();
                result_data.insert("status_code".to_string(), Value::from(response.status_code));
                result_data.insert("message".to_string(), Value::from(response.message.clone()));
                result_data.insert(
                    "data".to_string(),
                    Value::Object(
                        response
                            .data
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                            .collect(),
                    ),
                );
                result_data.insert("error".to_string(), Value::from(response.error.clone()));
                result_data.insert(
                    "execution_time".to_string(),
                    Value::from(response.execution_time),
                );
                job.result = Some(JobResult::success(result_data.clone()));

                self.tracker
                    .complete_execution(span, &ExecutionResult::success(result_data))
                    .await;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.tracker
                    .complete_execution(span, &ExecutionResult::failure(message.clone()))
                    .await;
                Err(JobError::new(message))
            }
        }
    }
}

// ============================================================================
// Health-check handler
// ============================================================================

/// Handles "health_check" jobs by probing the executor.
pub struct HealthCheckJobHandler {
    executor: Arc<ExecutorClient>,
}

impl HealthCheckJobHandler {
    pub fn new(executor: Arc<ExecutorClient>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl JobHandler for HealthCheckJobHandler {
    fn job_type(&self) -> &str {
        HEALTH_CHECK_JOB_TYPE
    }

    async fn handle(&self, _ctx: &JobContext, job: &mut Job) -> Result<(), JobError> {
        let service = job
            .payload
            .get("service")
            .and_then(Value::as_str)
            .unwrap_or("executor")
            .to_string();

        let health = self
            .executor
            .health_check(&service)
            .await
            .map_err(|e| JobError::new(e.to_string()))?;

        let mut data = HashMap::new();
        data.insert("status".to_string(), Value::from(health.status));
        data.insert("message".to_string(), Value::from(health.message));
        job.result = Some(JobResult::success(data));
        Ok(())
    }
}

// ============================================================================
// Stats bridge
// ============================================================================

/// Bridges the executor client's stats hook into the tracker's metrics
/// registry.
///
/// Execution totals are recorded by the tracker when spans close, so this
/// sink only feeds the error-type histogram; counting executions here as
/// well would double-book the dual-dispatch paths.
pub struct RegistryStatsSink {
    metrics: Arc<MetricsRegistry>,
}

impl RegistryStatsSink {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }
}

impl StatsSink for RegistryStatsSink {
    fn record_execution(&self, _plugin: &str, _method: &str, _duration: Duration, _success: bool) {
        // Totals come from tracker spans.
    }

    fn record_error(&self, plugin: &str, _method: &str, message: &str) {
        self.metrics.record_error(plugin, ErrorKind::classify(message));
    }
}
