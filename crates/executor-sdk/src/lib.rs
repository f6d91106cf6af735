//! # Executor SDK
//!
//! Client library for the out-of-process webhook plugin executor.
//!
//! This library provides:
//! - A typed gRPC client with connect/disconnect lifecycle
//! - Per-call deadlines and reconnect-with-retry on the execute path
//! - Observer hooks (log and stats sinks) that never block the data path
//! - A transport seam so consumers can test without a live executor
//!
//! ## Module Organization
//!
//! - [`error`] - Error types and connection-failure classification
//! - [`proto`] - Generated wire types for the `WebhookExecutor` service
//! - [`transport`] - Transport trait, gRPC implementation, connectors
//! - [`client`] - The retrying executor client
//! - [`observer`] - Log and stats sink capabilities

// Module declarations
pub mod client;
pub mod error;
pub mod observer;
pub mod proto;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use client::{ConnectionState, ExecutorClient, ExecutorClientConfig};
pub use error::ExecutorError;
pub use observer::{
    LogEntry, LogLevel, LogSink, MemoryLogSink, MemoryStatsSink, StatsSink, TracingLogSink,
};
pub use proto::{
    ExecutePluginRequest, ExecutePluginResponse, GetPluginInfoResponse, HealthCheckResponse,
    ListPluginsResponse, PluginInfo,
};
pub use transport::{ExecutorTransport, GrpcConnector, GrpcTransport, StaticTransportConnector, TransportConnector};
