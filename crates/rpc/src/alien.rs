//! The `alien` namespace.
//!
//! Read-only snapshot queries answered by the engine. The same namespace is
//! what side chains call on their main chain, so the generated
//! [`AlienApiClient`] is also the transport of
//! [`HttpMainChainClient`](crate::HttpMainChainClient).

use crate::RpcError;
use alien_consensus::{MainChainSnapshot, Snapshot, SnapshotApi};
use alien_types::H256;
use async_trait::async_trait;
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use tracing::{debug, instrument};

/// Snapshot queries of the Alien engine.
#[rpc(server, client, namespace = "alien")]
pub trait AlienApi {
    /// Returns the snapshot at canonical block `number`, or at the head.
    #[method(name = "getSnapshot")]
    async fn get_snapshot(&self, number: Option<u64>) -> RpcResult<Snapshot>;

    /// Returns the snapshot at block `hash`.
    #[method(name = "getSnapshotAtHash")]
    async fn get_snapshot_at_hash(&self, hash: H256) -> RpcResult<Snapshot>;

    /// Returns the snapshot at canonical block `number`.
    #[method(name = "getSnapshotAtNumber")]
    async fn get_snapshot_at_number(&self, number: u64) -> RpcResult<Snapshot>;

    /// Returns the rotation side chain `sc_hash` follows at header time `time`.
    #[method(name = "getSnapshotByHeaderTime")]
    async fn get_snapshot_by_header_time(
        &self,
        time: u64,
        sc_hash: H256,
    ) -> RpcResult<MainChainSnapshot>;
}

/// `alien` namespace backed by a [`SnapshotApi`].
pub struct AlienApiImpl {
    api: SnapshotApi,
}

impl AlienApiImpl {
    /// Create the namespace handler.
    pub fn new(api: SnapshotApi) -> Self {
        Self { api }
    }
}

fn rpc_err(err: alien_consensus::AlienError) -> jsonrpsee::types::ErrorObjectOwned {
    RpcError::from(err).into()
}

#[async_trait]
impl AlienApiServer for AlienApiImpl {
    #[instrument(skip(self), level = "debug")]
    async fn get_snapshot(&self, number: Option<u64>) -> RpcResult<Snapshot> {
        let snap = self.api.get_snapshot(number).map_err(rpc_err)?;
        debug!(number = snap.number, "alien_getSnapshot");
        Ok(snap)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_snapshot_at_hash(&self, hash: H256) -> RpcResult<Snapshot> {
        let snap = self.api.get_snapshot_at_hash(hash).map_err(rpc_err)?;
        debug!(number = snap.number, "alien_getSnapshotAtHash");
        Ok(snap)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_snapshot_at_number(&self, number: u64) -> RpcResult<Snapshot> {
        self.api.get_snapshot_at_number(number).map_err(rpc_err)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_snapshot_by_header_time(
        &self,
        time: u64,
        sc_hash: H256,
    ) -> RpcResult<MainChainSnapshot> {
        let snap = self
            .api
            .get_snapshot_by_header_time(time, sc_hash)
            .map_err(rpc_err)?;
        debug!(
            number = snap.number,
            signers = snap.signers.len(),
            notices = snap.sc_notices.len(),
            "alien_getSnapshotByHeaderTime"
        );
        Ok(snap)
    }
}
