//! Tests for the executor client lifecycle, retry, and observer behavior.

use super::*;
use crate::observer::{MemoryLogSink, MemoryStatsSink};
use crate::proto::{GetPluginInfoResponse, HealthCheckResponse, ListPluginsResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::AtomicU32;

/// One scripted outcome for an execute call.
enum Step {
    Ok(ExecutePluginResponse),
    ConnectionReset,
    InvalidArgument,
}

impl Step {
    fn resolve(self) -> Result<ExecutePluginResponse, ExecutorError> {
        match self {
            Step::Ok(response) => Ok(response),
            Step::ConnectionReset => Err(ExecutorError::Rpc {
                code: tonic::Code::Unknown,
                message: "connection reset by peer".to_string(),
            }),
            Step::InvalidArgument => Err(ExecutorError::Rpc {
                code: tonic::Code::InvalidArgument,
                message: "bad payload".to_string(),
            }),
        }
    }
}

fn ok_response(status_code: i32) -> ExecutePluginResponse {
    let mut data = HashMap::new();
    data.insert("reply".to_string(), "hi".to_string());
    ExecutePluginResponse {
        status_code,
        message: "ok".to_string(),
        data,
        error: String::new(),
        execution_time: 0.01,
    }
}

/// Transport that replays a script of execute outcomes. Calls beyond the
/// script succeed with status 200.
struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    execute_calls: AtomicU32,
    list_calls: AtomicU32,
    delay: Duration,
}

impl ScriptedTransport {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            execute_calls: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(vec![])
        }
    }

    fn execute_calls(&self) -> u32 {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutorTransport for ScriptedTransport {
    async fn execute_plugin(
        &self,
        _request: crate::proto::ExecutePluginRequest,
    ) -> Result<ExecutePluginResponse, ExecutorError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        let step = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match step {
            Some(step) => step.resolve(),
            None => Ok(ok_response(200)),
        }
    }

    async fn list_plugins(
        &self,
        _request: crate::proto::ListPluginsRequest,
    ) -> Result<ListPluginsResponse, ExecutorError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Err(ExecutorError::Rpc {
            code: tonic::Code::Unavailable,
            message: "connect error".to_string(),
        })
    }

    async fn get_plugin_info(
        &self,
        _request: crate::proto::GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, ExecutorError> {
        Ok(GetPluginInfoResponse {
            plugin: None,
            found: false,
        })
    }

    async fn health_check(
        &self,
        _request: crate::proto::HealthCheckRequest,
    ) -> Result<HealthCheckResponse, ExecutorError> {
        Ok(HealthCheckResponse {
            status: "healthy".to_string(),
            message: String::new(),
            details: HashMap::new(),
        })
    }
}

/// Connector that counts dials and can fail the first N of them.
struct CountingConnector {
    transport: Arc<ScriptedTransport>,
    dials: AtomicU32,
    fail_first: AtomicU32,
}

impl CountingConnector {
    fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            transport,
            dials: AtomicU32::new(0),
            fail_first: AtomicU32::new(0),
        }
    }

    fn failing_first(transport: Arc<ScriptedTransport>, failures: u32) -> Self {
        Self {
            fail_first: AtomicU32::new(failures),
            ..Self::new(transport)
        }
    }
}

#[async_trait]
impl TransportConnector for CountingConnector {
    async fn dial(
        &self,
        endpoint: &str,
        _connect_timeout: Duration,
    ) -> Result<Arc<dyn ExecutorTransport>, ExecutorError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(ExecutorError::ConnectFailed {
                endpoint: endpoint.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.transport.clone())
    }
}

fn fast_config(max_retries: u32) -> ExecutorClientConfig {
    ExecutorClientConfig {
        max_retries,
        retry_backoff: Duration::from_millis(1),
        call_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

async fn connected_client(
    script: Vec<Step>,
    max_retries: u32,
) -> (Arc<ScriptedTransport>, ExecutorClient) {
    let transport = Arc::new(ScriptedTransport::new(script));
    let client = ExecutorClient::with_transport(fast_config(max_retries), transport.clone());
    (transport, client)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn starts_disconnected_and_fails_fast() {
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let client = ExecutorClient::with_connector(
        fast_config(3),
        Box::new(CountingConnector::new(transport.clone())),
    );

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());

    let err = client
        .execute("echo", "GET", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::NotConnected));
    // No implicit connect on the data path.
    assert_eq!(transport.execute_calls(), 0);
}

#[tokio::test]
async fn connect_transitions_to_connected() {
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let client = ExecutorClient::with_connector(
        fast_config(3),
        Box::new(CountingConnector::new(transport)),
    );

    client.connect().await.expect("connect succeeds");

    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.is_connected());
}

#[tokio::test]
async fn failed_connect_stays_disconnected() {
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let client = ExecutorClient::with_connector(
        fast_config(3),
        Box::new(CountingConnector::failing_first(transport, 1)),
    );

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, ExecutorError::ConnectFailed { .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn close_is_idempotent() {
    let (_transport, client) = connected_client(vec![], 3).await;

    client.close();
    client.close();

    assert!(!client.is_connected());
    let err = client
        .execute("echo", "GET", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::NotConnected));
}

// ============================================================================
// Execute retry discipline
// ============================================================================

#[tokio::test]
async fn execute_returns_plugin_response() {
    let (transport, client) = connected_client(vec![Step::Ok(ok_response(200))], 3).await;

    let response = client
        .execute("echo", "GET", HashMap::new(), HashMap::new(), "msg=hi")
        .await
        .expect("execute succeeds");

    assert_eq!(response.status_code, 200);
    assert_eq!(response.data.get("reply").map(String::as_str), Some("hi"));
    assert_eq!(transport.execute_calls(), 1);
}

#[tokio::test]
async fn connection_reset_reconnects_and_retries() {
    let (transport, client) =
        connected_client(vec![Step::ConnectionReset, Step::Ok(ok_response(200))], 3).await;

    let response = client
        .execute("echo", "POST", HashMap::new(), HashMap::new(), "")
        .await
        .expect("second attempt succeeds");

    assert_eq!(response.status_code, 200);
    assert_eq!(transport.execute_calls(), 2);
    assert_eq!(client.reconnect_count(), 1);
    assert!(client.is_connected());
}

#[tokio::test]
async fn non_connection_errors_propagate_without_retry() {
    let (transport, client) = connected_client(vec![Step::InvalidArgument], 3).await;

    let err = client
        .execute("echo", "POST", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutorError::Rpc {
            code: tonic::Code::InvalidArgument,
            ..
        }
    ));
    assert_eq!(transport.execute_calls(), 1);
    assert_eq!(client.reconnect_count(), 0);
}

#[tokio::test]
async fn retries_are_capped_at_max_retries() {
    let script = vec![
        Step::ConnectionReset,
        Step::ConnectionReset,
        Step::ConnectionReset,
        Step::ConnectionReset,
    ];
    let (transport, client) = connected_client(script, 2).await;

    let err = client
        .execute("echo", "POST", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap_err();

    assert!(err.is_connection_error());
    // Initial call plus two retries, no more.
    assert_eq!(transport.execute_calls(), 3);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn call_timeout_surfaces_as_timeout_error() {
    let transport = Arc::new(ScriptedTransport::slow(Duration::from_secs(5)));
    let config = ExecutorClientConfig {
        call_timeout: Duration::from_millis(50),
        max_retries: 0,
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    };
    let client = ExecutorClient::with_transport(config, transport);

    let err = client
        .execute("echo", "GET", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Timeout { .. }));
}

// ============================================================================
// Operator-facing calls never retry
// ============================================================================

#[tokio::test]
async fn list_plugins_does_not_retry() {
    let (transport, client) = connected_client(vec![], 3).await;

    let err = client.list_plugins("").await.unwrap_err();

    assert!(err.is_connection_error());
    assert_eq!(transport.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.reconnect_count(), 0);
}

#[tokio::test]
async fn health_check_passes_through() {
    let (_transport, client) = connected_client(vec![], 3).await;

    let health = client.health_check("executor").await.unwrap();

    assert_eq!(health.status, "healthy");
}

// ============================================================================
// Observer hooks
// ============================================================================

#[tokio::test]
async fn sinks_observe_successful_execution() {
    let (_transport, client) = connected_client(vec![Step::Ok(ok_response(200))], 3).await;
    let logs = Arc::new(MemoryLogSink::new());
    let stats = Arc::new(MemoryStatsSink::new());
    client.set_log_sink(logs.clone()).unwrap();
    client.set_stats_sink(stats.clone()).unwrap();

    client
        .execute("echo", "GET", HashMap::new(), HashMap::new(), "")
        .await
        .unwrap();

    let entries = logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Info);
    assert!(!entries[0].request_id.is_empty());

    let executions = stats.executions();
    assert_eq!(executions.len(), 1);
    assert!(executions[0].success);
    assert!(stats.errors().is_empty());
}

#[tokio::test]
async fn failing_plugin_status_records_error_but_returns_ok() {
    let mut response = ok_response(500);
    response.error = "bad".to_string();
    let (_transport, client) = connected_client(vec![Step::Ok(response)], 3).await;
    let logs = Arc::new(MemoryLogSink::new());
    let stats = Arc::new(MemoryStatsSink::new());
    client.set_log_sink(logs.clone()).unwrap();
    client.set_stats_sink(stats.clone()).unwrap();

    let response = client
        .execute("echo", "POST", HashMap::new(), HashMap::new(), "")
        .await
        .expect("delivery succeeded");

    assert_eq!(response.status_code, 500);
    assert_eq!(response.error, "bad");

    // Delivered-but-failing is a warning plus an error stat, not a failure.
    let entries = logs.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].level, LogLevel::Warn);
    assert_eq!(stats.errors().len(), 1);
    assert!(!stats.executions()[0].success);
}

#[tokio::test]
async fn rpc_failure_logs_error_level() {
    let (_transport, client) = connected_client(vec![Step::InvalidArgument], 3).await;
    let logs = Arc::new(MemoryLogSink::new());
    client.set_log_sink(logs.clone()).unwrap();

    let _ = client
        .execute("echo", "POST", HashMap::new(), HashMap::new(), "")
        .await;

    let entries = logs.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(entries[1].level, LogLevel::Error);
}

#[tokio::test]
async fn sinks_are_set_once() {
    let (_transport, client) = connected_client(vec![], 3).await;

    client.set_log_sink(Arc::new(MemoryLogSink::new())).unwrap();
    let err = client
        .set_log_sink(Arc::new(MemoryLogSink::new()))
        .unwrap_err();
    assert!(matches!(err, ExecutorError::SinkAlreadySet { sink: "log" }));

    client
        .set_stats_sink(Arc::new(MemoryStatsSink::new()))
        .unwrap();
    let err = client
        .set_stats_sink(Arc::new(MemoryStatsSink::new()))
        .unwrap_err();
    assert!(matches!(err, ExecutorError::SinkAlreadySet { sink: "stats" }));
}
