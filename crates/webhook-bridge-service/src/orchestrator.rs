//! Orchestrator: wires storage, tracker, executor client, worker pool, and
//! the HTTP listener, and drives the shutdown sequence in reverse
//! dependency order.
//!
//! Startup order: storage -> tracker -> executor connect (non-fatal;
//! degraded mode leaves the ingress answering 503) -> pool -> HTTP.
//! Shutdown: HTTP (30 s deadline) -> pool (bounded by the job timeout) ->
//! cleanup worker -> storage -> executor. A component missing its deadline
//! is logged and abandoned.

use crate::config::BridgeConfig;
use crate::jobs::{HealthCheckJobHandler, RegistryStatsSink, WebhookJobHandler};
use crate::{create_router, AppState};
use chrono::Utc;
use executor_sdk::{ExecutorClient, TracingLogSink, TransportConnector};
use pool_runtime::WorkerPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use webhook_bridge_core::{
    ExecutionStorage, ExecutionTracker, InMemoryExecutionStorage, SqliteExecutionStorage,
};

/// Deadline for draining HTTP connections on shutdown.
const HTTP_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Grace period for the cleanup worker to notice cancellation.
const CLEANUP_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(2);

/// Service-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("server failed: {message}")]
    ServerFailed { message: String },

    #[error("storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),
}

// ============================================================================
// Runtime
// ============================================================================

/// Assembled bridge components, ready to serve.
pub struct BridgeRuntime {
    pub state: AppState,
    storage: Arc<dyn ExecutionStorage>,
    cleanup_shutdown: CancellationToken,
    cleanup_handle: JoinHandle<()>,
}

impl BridgeRuntime {
    /// Assemble every component against the production gRPC connector.
    pub async fn bootstrap(config: BridgeConfig) -> Result<Self, ServiceError> {
        let client = Arc::new(ExecutorClient::new(config.executor.client_config()));
        Self::assemble(config, client).await
    }

    /// Assemble with a custom transport connector (tests, embedded
    /// executors).
    pub async fn bootstrap_with_connector(
        config: BridgeConfig,
        connector: Box<dyn TransportConnector>,
    ) -> Result<Self, ServiceError> {
        let client = Arc::new(ExecutorClient::with_connector(
            config.executor.client_config(),
            connector,
        ));
        Self::assemble(config, client).await
    }

    async fn assemble(
        config: BridgeConfig,
        executor: Arc<ExecutorClient>,
    ) -> Result<Self, ServiceError> {
        // Storage first; everything else hangs off the tracker.
        let storage = open_storage(&config).await?;
        let tracker = Arc::new(ExecutionTracker::new(
            Arc::clone(&storage),
            config
                .execution_tracking
                .tracker_config(config.storage.retention_days),
        ));

        let cleanup_shutdown = CancellationToken::new();
        let cleanup_handle = tracker.spawn_cleanup(cleanup_shutdown.clone());

        // Observer hooks are set exactly once, before the first execute.
        if executor.set_log_sink(Arc::new(TracingLogSink)).is_err() {
            warn!("Executor log sink was already installed");
        }
        if executor
            .set_stats_sink(Arc::new(RegistryStatsSink::new(tracker.metrics())))
            .is_err()
        {
            warn!("Executor stats sink was already installed");
        }

        // A failed dial is degraded mode, not a startup failure: the
        // ingress rejects webhook calls with 503 until a reconnect lands.
        if let Err(e) = executor.connect().await {
            warn!(error = %e, "Executor connect failed; starting degraded");
        }

        let mut pool = WorkerPool::new(config.worker.pool_config());
        pool.register_handler(Arc::new(WebhookJobHandler::new(
            Arc::clone(&executor),
            Arc::clone(&tracker),
        )))
        .expect("handlers register before start");
        pool.register_handler(Arc::new(HealthCheckJobHandler::new(Arc::clone(&executor))))
            .expect("handlers register before start");
        pool.start().expect("pool starts once");

        let state = AppState {
            config,
            executor,
            pool: Arc::new(pool),
            tracker,
            started_at: Utc::now(),
        };

        Ok(Self {
            state,
            storage,
            cleanup_shutdown,
            cleanup_handle,
        })
    }

    /// Router over the assembled state.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Tear down in reverse dependency order.
    pub async fn shutdown(self) {
        info!("Shutting down bridge components");

        self.state.pool.stop().await;

        // Handlers cut off by the job deadline never close their spans;
        // settle anything still marked running before the store goes away.
        self.state.tracker.cancel_running().await;

        self.cleanup_shutdown.cancel();
        if tokio::time::timeout(CLEANUP_SHUTDOWN_DEADLINE, self.cleanup_handle)
            .await
            .is_err()
        {
            warn!("Cleanup worker missed its shutdown deadline; abandoning");
        }

        if let Err(e) = self.storage.close().await {
            warn!(error = %e, "Storage close failed");
        }

        self.state.executor.close();
        info!("Bridge components stopped");
    }
}

async fn open_storage(config: &BridgeConfig) -> Result<Arc<dyn ExecutionStorage>, ServiceError> {
    let storage: Arc<dyn ExecutionStorage> = match config.storage.backend.as_str() {
        "memory" => Arc::new(InMemoryExecutionStorage::new()),
        _ => match SqliteExecutionStorage::connect(
            &config.storage.path,
            config.storage.max_connections,
        )
        .await
        {
            Ok(storage) => Arc::new(storage),
            Err(e) if !config.execution_tracking.enabled => {
                // Tracking is off: an unusable store is not worth dying
                // over. Keep the storage surface alive in memory.
                warn!(error = %e, "Storage open failed with tracking disabled; using memory store");
                Arc::new(InMemoryExecutionStorage::new())
            }
            Err(e) => {
                return Err(ServiceError::StorageUnavailable {
                    message: e.to_string(),
                });
            }
        },
    };

    if let Err(e) = storage.initialize().await {
        if config.execution_tracking.enabled {
            return Err(ServiceError::StorageUnavailable {
                message: e.to_string(),
            });
        }
        warn!(error = %e, "Storage initialize failed with tracking disabled");
    }

    Ok(storage)
}

// ============================================================================
// Serve loop
// ============================================================================

/// Run the service until SIGINT/SIGTERM, then shut down in order.
pub async fn run(config: BridgeConfig) -> Result<(), ServiceError> {
    run_with_shutdown(config, shutdown_signal()).await
}

/// Run the service until the given future resolves.
pub async fn run_with_shutdown(
    config: BridgeConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServiceError> {
    let address = config.server.bind_address();
    let runtime = BridgeRuntime::bootstrap(config).await?;
    let app = runtime.router();

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;
    info!(%address, "HTTP server listening");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            // The server ended on its own: surface the failure after a
            // best-effort component shutdown.
            runtime.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServiceError::ServerFailed { message: e.to_string() }),
                Err(e) => Err(ServiceError::ServerFailed { message: e.to_string() }),
            };
        }
        _ = shutdown => {
            info!("Shutdown signal received");
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(HTTP_SHUTDOWN_DEADLINE, &mut server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "HTTP server stopped with error"),
        Ok(Err(e)) => error!(error = %e, "HTTP server task failed"),
        Err(_) => {
            warn!(deadline = ?HTTP_SHUTDOWN_DEADLINE, "HTTP drain missed deadline; abandoning");
            server.abort();
        }
    }

    runtime.shutdown().await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
