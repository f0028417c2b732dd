//! # Alien RPC
//!
//! JSON-RPC surface of the Alien consensus engine.
//!
//! This crate provides:
//! - The `alien` namespace (`alien_getSnapshot`, `alien_getSnapshotAtHash`,
//!   `alien_getSnapshotAtNumber`, `alien_getSnapshotByHeaderTime`) served
//!   over HTTP
//! - [`HttpMainChainClient`], the side-chain engine's view of its main chain
//!
//! ## Example
//!
//! ```rust,ignore
//! use alien_rpc::{RpcServer, RpcServerConfig};
//!
//! let api = SnapshotApi::new(engine.clone(), chain.clone());
//! let mut server = RpcServer::new(RpcServerConfig::default(), api);
//! server.start().await?;
//! ```
//!
//! A side chain points its engine at the main chain's `alien` namespace:
//!
//! ```rust,ignore
//! let client = HttpMainChainClient::new(&config.alien)?;
//! let engine = Alien::new(config, alloc, db)?.with_main_chain(Arc::new(client));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod alien;
pub mod main_chain;
pub mod server;

pub use alien::{AlienApiClient, AlienApiImpl, AlienApiServer};
pub use main_chain::HttpMainChainClient;
pub use server::{start_server, RpcServer, RpcServerConfig};

use alien_consensus::AlienError;
use thiserror::Error;

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// RPC error types.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Invalid request parameters.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Requested block is not in the chain.
    #[error("Block not found")]
    BlockNotFound,

    /// The engine failed to answer the query.
    #[error("Consensus error: {0}")]
    Consensus(AlienError),

    /// Server is not running.
    #[error("Server not ready")]
    ServerNotReady,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AlienError> for RpcError {
    fn from(err: AlienError) -> Self {
        match err {
            AlienError::UnknownBlock | AlienError::UnknownAncestor => RpcError::BlockNotFound,
            other => RpcError::Consensus(other),
        }
    }
}

impl From<RpcError> for jsonrpsee::types::ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        let (code, message) = match &err {
            RpcError::InvalidParams(_) => (-32602, err.to_string()),
            RpcError::BlockNotFound => (-32001, err.to_string()),
            RpcError::ServerNotReady => (-32002, err.to_string()),
            RpcError::Consensus(_) => (-32000, err.to_string()),
            RpcError::Internal(_) => (-32603, err.to_string()),
        };
        jsonrpsee::types::ErrorObjectOwned::owned(code, message, None::<()>)
    }
}
