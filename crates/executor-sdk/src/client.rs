//! The executor client: one long-lived connection, per-call deadlines, and
//! a reconnect-and-retry discipline on the execute path.
//!
//! Lifecycle is `Disconnected -> Connecting -> Connected` and back. The
//! data path never connects implicitly: a call on a disconnected client
//! fails fast so the ingress can answer 503 instead of stalling.

use crate::error::ExecutorError;
use crate::observer::{LogEntry, LogLevel, LogSink, StatsSink};
use crate::proto::{
    ExecutePluginRequest, ExecutePluginResponse, GetPluginInfoRequest, GetPluginInfoResponse,
    HealthCheckRequest, HealthCheckResponse, ListPluginsRequest, ListPluginsResponse,
};
use crate::transport::{ExecutorTransport, GrpcConnector, StaticTransportConnector, TransportConnector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// Client connection and retry knobs.
#[derive(Debug, Clone)]
pub struct ExecutorClientConfig {
    pub host: String,
    pub port: u16,

    /// Deadline applied to every RPC
    pub call_timeout: Duration,

    /// Ceiling on one dial attempt
    pub connect_timeout: Duration,

    /// Reconnect attempts per execute call before surfacing the error
    pub max_retries: u32,

    /// Linear back-off unit: attempt N sleeps `N * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for ExecutorClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            call_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ExecutorClientConfig {
    /// Plaintext endpoint URL for the tonic channel.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ============================================================================
// Client
// ============================================================================

/// Single-homed client to the plugin executor.
pub struct ExecutorClient {
    config: ExecutorClientConfig,
    connector: Box<dyn TransportConnector>,
    transport: Mutex<Option<Arc<dyn ExecutorTransport>>>,
    connected: AtomicBool,
    state: Mutex<ConnectionState>,
    /// Successful re-dials performed by the execute retry path
    reconnects: AtomicU32,
    log_sink: OnceLock<Arc<dyn LogSink>>,
    stats_sink: OnceLock<Arc<dyn StatsSink>>,
}

impl ExecutorClient {
    /// Client over the production gRPC connector.
    pub fn new(config: ExecutorClientConfig) -> Self {
        Self::with_connector(config, Box::new(GrpcConnector))
    }

    /// Client over a custom connector (tests, embedded executors).
    pub fn with_connector(
        config: ExecutorClientConfig,
        connector: Box<dyn TransportConnector>,
    ) -> Self {
        Self {
            config,
            connector,
            transport: Mutex::new(None),
            connected: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Disconnected),
            reconnects: AtomicU32::new(0),
            log_sink: OnceLock::new(),
            stats_sink: OnceLock::new(),
        }
    }

    /// Already-connected client over a fixed transport.
    pub fn with_transport(
        config: ExecutorClientConfig,
        transport: Arc<dyn ExecutorTransport>,
    ) -> Self {
        let client = Self::with_connector(
            config,
            Box::new(StaticTransportConnector::new(Arc::clone(&transport))),
        );
        client.store_transport(transport);
        client
    }

    /// Install the log sink. Set-once: a second call is rejected and the
    /// original sink stays in place.
    pub fn set_log_sink(&self, sink: Arc<dyn LogSink>) -> Result<(), ExecutorError> {
        self.log_sink
            .set(sink)
            .map_err(|_| ExecutorError::SinkAlreadySet { sink: "log" })
    }

    /// Install the stats sink. Set-once.
    pub fn set_stats_sink(&self, sink: Arc<dyn StatsSink>) -> Result<(), ExecutorError> {
        self.stats_sink
            .set(sink)
            .map_err(|_| ExecutorError::SinkAlreadySet { sink: "stats" })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("client state lock poisoned")
    }

    /// Lock-free connectivity probe used by the ingress fail-fast check.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
            && self
                .transport
                .lock()
                .expect("client transport lock poisoned")
                .is_some()
    }

    /// Re-dials performed by the execute retry path since startup.
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Dial the executor. Blocking up to the configured connect ceiling;
    /// failure leaves the client Disconnected.
    pub async fn connect(&self) -> Result<(), ExecutorError> {
        self.set_state(ConnectionState::Connecting);
        match self
            .connector
            .dial(&self.config.endpoint(), self.config.connect_timeout)
            .await
        {
            Ok(transport) => {
                self.store_transport(transport);
                info!(endpoint = %self.config.endpoint(), "Connected to executor");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Drop the connection. Idempotent; safe after any failure.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.set_state(ConnectionState::Disconnected);
        self.transport
            .lock()
            .expect("client transport lock poisoned")
            .take();
    }

    // ------------------------------------------------------------------
    // Execute (retrying)
    // ------------------------------------------------------------------

    /// Run one plugin invocation.
    ///
    /// Connection-shaped failures trigger up to `max_retries` reconnect
    /// attempts with linear back-off; other failures propagate immediately.
    /// A response with a non-2xx status code is a successful delivery, not
    /// an error.
    pub async fn execute(
        &self,
        plugin: &str,
        method: &str,
        data: HashMap<String, String>,
        headers: HashMap<String, String>,
        query_string: &str,
    ) -> Result<ExecutePluginResponse, ExecutorError> {
        let transport = self.current_transport()?;
        let request_id = Uuid::new_v4().to_string();

        self.append_log(LogEntry {
            level: LogLevel::Info,
            plugin: plugin.to_string(),
            method: method.to_string(),
            request_id: request_id.clone(),
            message: "executing plugin".to_string(),
        });

        let request = ExecutePluginRequest {
            plugin_name: plugin.to_string(),
            http_method: method.to_string(),
            data,
            headers,
            query_string: query_string.to_string(),
        };

        let started = Instant::now();
        let result = self.execute_with_retry(transport, request).await;
        let duration = started.elapsed();

        self.observe_execute(plugin, method, &request_id, duration, &result);
        result
    }

    async fn execute_with_retry(
        &self,
        mut transport: Arc<dyn ExecutorTransport>,
        request: ExecutePluginRequest,
    ) -> Result<ExecutePluginResponse, ExecutorError> {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.call_bounded(transport.execute_plugin(request.clone())).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !err.is_connection_error() || attempt >= self.config.max_retries {
                if err.is_connection_error() {
                    self.mark_disconnected();
                }
                return Err(err);
            }

            // The stale transport stays installed while the retry is live:
            // concurrent callers keep going through it (and classify their
            // own failures) instead of being failed fast mid-recovery.
            attempt += 1;
            let backoff = self.config.retry_backoff * attempt;
            warn!(
                attempt,
                max_retries = self.config.max_retries,
                ?backoff,
                error = %err,
                "Execute hit connection failure; reconnecting"
            );
            tokio::time::sleep(backoff).await;

            match self
                .connector
                .dial(&self.config.endpoint(), self.config.connect_timeout)
                .await
            {
                Ok(fresh) => {
                    self.store_transport(Arc::clone(&fresh));
                    self.reconnects.fetch_add(1, Ordering::Relaxed);
                    transport = fresh;
                }
                Err(dial_err) => {
                    if attempt >= self.config.max_retries {
                        return Err(dial_err);
                    }
                    debug!(attempt, error = %dial_err, "Reconnect attempt failed");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Operator-facing calls (no retry: they must expose state truthfully)
    // ------------------------------------------------------------------

    pub async fn list_plugins(&self, filter: &str) -> Result<ListPluginsResponse, ExecutorError> {
        let transport = self.current_transport()?;
        self.call_bounded(transport.list_plugins(ListPluginsRequest {
            filter: filter.to_string(),
        }))
        .await
    }

    pub async fn get_plugin_info(
        &self,
        plugin: &str,
    ) -> Result<GetPluginInfoResponse, ExecutorError> {
        let transport = self.current_transport()?;
        self.call_bounded(transport.get_plugin_info(GetPluginInfoRequest {
            plugin_name: plugin.to_string(),
        }))
        .await
    }

    pub async fn health_check(&self, service: &str) -> Result<HealthCheckResponse, ExecutorError> {
        let transport = self.current_transport()?;
        self.call_bounded(transport.health_check(HealthCheckRequest {
            service: service.to_string(),
        }))
        .await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn call_bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ExecutorError>>,
    ) -> Result<T, ExecutorError> {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout {
                timeout: self.config.call_timeout,
            }),
        }
    }

    fn current_transport(&self) -> Result<Arc<dyn ExecutorTransport>, ExecutorError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ExecutorError::NotConnected);
        }
        self.transport
            .lock()
            .expect("client transport lock poisoned")
            .as_ref()
            .cloned()
            .ok_or(ExecutorError::NotConnected)
    }

    fn store_transport(&self, transport: Arc<dyn ExecutorTransport>) {
        *self
            .transport
            .lock()
            .expect("client transport lock poisoned") = Some(transport);
        self.connected.store(true, Ordering::Release);
        self.set_state(ConnectionState::Connected);
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("client state lock poisoned") = state;
    }

    fn append_log(&self, entry: LogEntry) {
        if let Some(sink) = self.log_sink.get() {
            sink.append(entry);
        }
    }

    /// Post-call observer hooks: stats always, error records and WARN/ERROR
    /// log entries on failure or a >= 400 plugin status.
    fn observe_execute(
        &self,
        plugin: &str,
        method: &str,
        request_id: &str,
        duration: Duration,
        result: &Result<ExecutePluginResponse, ExecutorError>,
    ) {
        match result {
            Ok(response) => {
                let delivered_ok = response.error.is_empty() && response.status_code < 400;
                if let Some(stats) = self.stats_sink.get() {
                    stats.record_execution(plugin, method, duration, delivered_ok);
                    if !delivered_ok {
                        let message = if response.error.is_empty() {
                            format!("plugin returned status {}", response.status_code)
                        } else {
                            response.error.clone()
                        };
                        stats.record_error(plugin, method, &message);
                    }
                }
                if !delivered_ok {
                    self.append_log(LogEntry {
                        level: LogLevel::Warn,
                        plugin: plugin.to_string(),
                        method: method.to_string(),
                        request_id: request_id.to_string(),
                        message: format!(
                            "plugin returned status {} {}",
                            response.status_code, response.error
                        ),
                    });
                }
            }
            Err(e) => {
                if let Some(stats) = self.stats_sink.get() {
                    stats.record_execution(plugin, method, duration, false);
                    stats.record_error(plugin, method, &e.to_string());
                }
                self.append_log(LogEntry {
                    level: LogLevel::Error,
                    plugin: plugin.to_string(),
                    method: method.to_string(),
                    request_id: request_id.to_string(),
                    message: format!("plugin execution failed: {}", e),
                });
            }
        }
    }
}
