//! Shared harness: a fully bootstrapped bridge over an in-process fake
//! executor.

use async_trait::async_trait;
use axum_test::TestServer;
use executor_sdk::proto::{
    ExecutePluginRequest, ExecutePluginResponse, GetPluginInfoRequest, GetPluginInfoResponse,
    HealthCheckRequest, HealthCheckResponse, ListPluginsRequest, ListPluginsResponse,
};
use executor_sdk::{ExecutorError, ExecutorTransport, StaticTransportConnector};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webhook_bridge_core::{ExecutionFilter, ExecutionRecord, ExecutionStorage};
use webhook_bridge_service::{BridgeConfig, BridgeRuntime};

/// Fake executor: echoes `msg` back as `reply`, with switchable failure
/// modes.
///
/// The bridge's response path forwards the caller's HTTP headers while the
/// audited job path sends none, so connection-failure injection can target
/// the response path alone and stay deterministic under dual dispatch.
#[derive(Default)]
pub struct FakeExecutor {
    /// Fail this many upcoming response-path calls with a connection reset
    pub fail_next_direct: AtomicU32,
    /// Respond with this status/error instead of 200
    pub plugin_status: Mutex<Option<(i32, String)>>,
    /// When set, execute blocks until permits are released
    pub gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    /// Total execute calls observed
    pub execute_calls: AtomicU32,
}

impl FakeExecutor {
    pub fn failing_next_direct(failures: u32) -> Self {
        let fake = Self::default();
        fake.fail_next_direct.store(failures, Ordering::SeqCst);
        fake
    }

    pub fn gated(gate: Arc<tokio::sync::Semaphore>) -> Self {
        let fake = Self::default();
        *fake.gate.lock().unwrap() = Some(gate);
        fake
    }

    pub fn set_plugin_status(&self, status_code: i32, error: &str) {
        *self.plugin_status.lock().unwrap() = Some((status_code, error.to_string()));
    }
}

#[async_trait]
impl ExecutorTransport for FakeExecutor {
    async fn execute_plugin(
        &self,
        request: ExecutePluginRequest,
    ) -> Result<ExecutePluginResponse, ExecutorError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        if !request.headers.is_empty() {
            let remaining = self.fail_next_direct.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next_direct.store(remaining - 1, Ordering::SeqCst);
                return Err(ExecutorError::Transport {
                    message: "connection reset by peer".to_string(),
                });
            }
        }

        let (status_code, error) = self
            .plugin_status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or((200, String::new()));
        let mut data = std::collections::HashMap::new();
        data.insert(
            "reply".to_string(),
            request.data.get("msg").cloned().unwrap_or_default(),
        );
        Ok(ExecutePluginResponse {
            status_code,
            message: "ok".to_string(),
            data,
            error,
            execution_time: 0.01,
        })
    }

    async fn list_plugins(
        &self,
        _request: ListPluginsRequest,
    ) -> Result<ListPluginsResponse, ExecutorError> {
        Ok(ListPluginsResponse {
            plugins: vec![],
            total_count: 0,
        })
    }

    async fn get_plugin_info(
        &self,
        _request: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, ExecutorError> {
        Ok(GetPluginInfoResponse {
            plugin: None,
            found: false,
        })
    }

    async fn health_check(
        &self,
        _request: HealthCheckRequest,
    ) -> Result<HealthCheckResponse, ExecutorError> {
        Ok(HealthCheckResponse {
            status: "healthy".to_string(),
            message: String::new(),
            details: std::collections::HashMap::new(),
        })
    }
}

/// A bootstrapped bridge plus its test server.
pub struct Bridge {
    pub runtime: BridgeRuntime,
    pub server: TestServer,
    pub executor: Arc<FakeExecutor>,
}

impl Bridge {
    pub fn storage(&self) -> Arc<dyn ExecutionStorage> {
        self.runtime.state.tracker.storage()
    }

    /// All records, newest first.
    pub async fn records(&self) -> Vec<ExecutionRecord> {
        self.storage()
            .list_executions(&ExecutionFilter::default())
            .await
            .expect("storage listable")
    }

    /// Poll the storage until the record set satisfies the predicate.
    pub async fn wait_for_records<F>(&self, predicate: F)
    where
        F: Fn(&[ExecutionRecord]) -> bool,
    {
        for _ in 0..400 {
            if predicate(&self.records().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("record condition not reached within deadline");
    }
}

/// Configuration tuned for fast in-process tests.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.storage.backend = "memory".to_string();
    config.worker.count = 2;
    config.worker.queue_size = 32;
    config.worker.job_timeout_seconds = 5;
    config.executor.timeout_seconds = 5;
    config.executor.max_retries = 2;
    config
}

pub async fn start_bridge() -> Bridge {
    start_bridge_with(FakeExecutor::default(), test_config()).await
}

pub async fn start_bridge_with(executor: FakeExecutor, config: BridgeConfig) -> Bridge {
    let executor = Arc::new(executor);
    let runtime = BridgeRuntime::bootstrap_with_connector(
        config,
        Box::new(StaticTransportConnector::new(executor.clone())),
    )
    .await
    .expect("bridge bootstraps");
    let server = TestServer::new(runtime.router()).expect("test server");
    Bridge {
        runtime,
        server,
        executor,
    }
}
