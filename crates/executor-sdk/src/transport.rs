//! Transport seam between the client and the wire.
//!
//! The client's lifecycle, retry, and observer logic is written against
//! [`ExecutorTransport`] so tests can run against an in-process fake; the
//! production implementation is a tonic channel.

use crate::error::ExecutorError;
use crate::proto::webhook_executor_client::WebhookExecutorClient;
use crate::proto::{
    ExecutePluginRequest, ExecutePluginResponse, GetPluginInfoRequest, GetPluginInfoResponse,
    HealthCheckRequest, HealthCheckResponse, ListPluginsRequest, ListPluginsResponse,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// One live link to the executor.
#[async_trait]
pub trait ExecutorTransport: Send + Sync {
    async fn execute_plugin(
        &self,
        request: ExecutePluginRequest,
    ) -> Result<ExecutePluginResponse, ExecutorError>;

    async fn list_plugins(
        &self,
        request: ListPluginsRequest,
    ) -> Result<ListPluginsResponse, ExecutorError>;

    async fn get_plugin_info(
        &self,
        request: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, ExecutorError>;

    async fn health_check(
        &self,
        request: HealthCheckRequest,
    ) -> Result<HealthCheckResponse, ExecutorError>;
}

/// Dials fresh transports; the client uses it for connect and reconnect.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn dial(
        &self,
        endpoint: &str,
        connect_timeout: Duration,
    ) -> Result<Arc<dyn ExecutorTransport>, ExecutorError>;
}

// ============================================================================
// gRPC transport
// ============================================================================

/// Production transport over a plaintext tonic channel.
pub struct GrpcTransport {
    client: WebhookExecutorClient<Channel>,
}

impl GrpcTransport {
    /// Dial the executor, bounding the whole attempt (DNS included) by
    /// `connect_timeout`.
    pub async fn dial(endpoint: &str, connect_timeout: Duration) -> Result<Self, ExecutorError> {
        let builder = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| ExecutorError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?
            .connect_timeout(connect_timeout);

        let channel = tokio::time::timeout(connect_timeout, builder.connect())
            .await
            .map_err(|_| ExecutorError::ConnectFailed {
                endpoint: endpoint.to_string(),
                message: format!("dial timed out after {:?}", connect_timeout),
            })?
            .map_err(|e| ExecutorError::ConnectFailed {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client: WebhookExecutorClient::new(channel),
        })
    }
}

#[async_trait]
impl ExecutorTransport for GrpcTransport {
    async fn execute_plugin(
        &self,
        request: ExecutePluginRequest,
    ) -> Result<ExecutePluginResponse, ExecutorError> {
        // Channel clones are cheap handles onto the same connection.
        let mut client = self.client.clone();
        client
            .execute_plugin(request)
            .await
            .map(|response| response.into_inner())
            .map_err(ExecutorError::from_status)
    }

    async fn list_plugins(
        &self,
        request: ListPluginsRequest,
    ) -> Result<ListPluginsResponse, ExecutorError> {
        let mut client = self.client.clone();
        client
            .list_plugins(request)
            .await
            .map(|response| response.into_inner())
            .map_err(ExecutorError::from_status)
    }

    async fn get_plugin_info(
        &self,
        request: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, ExecutorError> {
        let mut client = self.client.clone();
        client
            .get_plugin_info(request)
            .await
            .map(|response| response.into_inner())
            .map_err(ExecutorError::from_status)
    }

    async fn health_check(
        &self,
        request: HealthCheckRequest,
    ) -> Result<HealthCheckResponse, ExecutorError> {
        let mut client = self.client.clone();
        client
            .health_check(request)
            .await
            .map(|response| response.into_inner())
            .map_err(ExecutorError::from_status)
    }
}

/// Default connector producing [`GrpcTransport`] links.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

#[async_trait]
impl TransportConnector for GrpcConnector {
    async fn dial(
        &self,
        endpoint: &str,
        connect_timeout: Duration,
    ) -> Result<Arc<dyn ExecutorTransport>, ExecutorError> {
        Ok(Arc::new(GrpcTransport::dial(endpoint, connect_timeout).await?))
    }
}

/// Connector that always hands out the same transport.
///
/// Lets tests (and embedded setups) inject an in-process executor while
/// keeping the client's reconnect path exercised.
pub struct StaticTransportConnector {
    transport: Arc<dyn ExecutorTransport>,
}

impl StaticTransportConnector {
    pub fn new(transport: Arc<dyn ExecutorTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TransportConnector for StaticTransportConnector {
    async fn dial(
        &self,
        _endpoint: &str,
        _connect_timeout: Duration,
    ) -> Result<Arc<dyn ExecutorTransport>, ExecutorError> {
        Ok(Arc::clone(&self.transport))
    }
}
