//! HTTP server for the `alien` namespace.

use crate::alien::{AlienApiImpl, AlienApiServer};
use crate::RpcError;
use alien_config::RpcConfig;
use alien_consensus::SnapshotApi;
use jsonrpsee::server::{BatchRequestConfig, ServerBuilder, ServerHandle};
use std::net::SocketAddr;
use tracing::info;

/// Largest request or response body, in bytes.
pub const MAX_BODY_BYTES: u32 = 10 << 20;

/// Listen address and limits.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Where to listen; port 0 picks a free one
    pub http_addr: SocketAddr,
    /// Concurrent connection cap
    pub max_connections: u32,
    /// Body size cap for requests and responses
    pub max_body_bytes: u32,
    /// Calls allowed in one batch
    pub max_batch_len: u32,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8545)),
            max_connections: 100,
            max_body_bytes: MAX_BODY_BYTES,
            max_batch_len: 100,
        }
    }
}

impl TryFrom<&RpcConfig> for RpcServerConfig {
    type Error = RpcError;

    fn try_from(rpc: &RpcConfig) -> Result<Self, RpcError> {
        let http_addr = rpc
            .http_address
            .parse()
            .map_err(|_| RpcError::InvalidParams(format!("bad listen address {}", rpc.http_address)))?;
        Ok(Self {
            http_addr,
            max_connections: rpc.max_connections,
            ..Self::default()
        })
    }
}

/// Serves snapshot queries until stopped.
pub struct RpcServer {
    config: RpcServerConfig,
    api: SnapshotApi,
    running: Option<(ServerHandle, SocketAddr)>,
}

impl RpcServer {
    /// A server that has not bound yet.
    pub fn new(config: RpcServerConfig, api: SnapshotApi) -> Self {
        Self {
            config,
            api,
            running: None,
        }
    }

    /// Binds and starts serving; returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, RpcError> {
        let limits = &self.config;
        let server = ServerBuilder::default()
            .max_connections(limits.max_connections)
            .max_request_body_size(limits.max_body_bytes)
            .max_response_body_size(limits.max_body_bytes)
            .set_batch_request_config(BatchRequestConfig::Limit(limits.max_batch_len))
            .build(limits.http_addr)
            .await
            .map_err(|e| RpcError::Internal(format!("cannot bind {}: {e}", limits.http_addr)))?;
        let addr = server
            .local_addr()
            .map_err(|e| RpcError::Internal(format!("no local address: {e}")))?;

        let methods = AlienApiImpl::new(self.api.clone()).into_rpc();
        self.running = Some((server.start(methods), addr));
        info!(%addr, "Serving alien namespace");
        Ok(addr)
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|(_, addr)| *addr)
    }

    /// Stops serving. Fails if the server is not running.
    pub fn stop(&mut self) -> Result<(), RpcError> {
        let (handle, addr) = self.running.take().ok_or(RpcError::ServerNotReady)?;
        handle
            .stop()
            .map_err(|e| RpcError::Internal(format!("stop failed: {e}")))?;
        info!(%addr, "RPC server stopped");
        Ok(())
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Starts a server on `addr` with default limits.
pub async fn start_server(addr: SocketAddr, api: SnapshotApi) -> Result<RpcServer, RpcError> {
    let mut server = RpcServer::new(
        RpcServerConfig {
            http_addr: addr,
            ..RpcServerConfig::default()
        },
        api,
    );
    server.start().await?;
    Ok(server)
}
