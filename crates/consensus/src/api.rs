//! Read-only snapshot queries exposed over RPC.

use alien_types::H256;
use std::sync::Arc;
use tracing::trace;

use crate::chain::ChainReader;
use crate::cross_chain::MainChainSnapshot;
use crate::engine::Alien;
use crate::error::{AlienError, Result};
use crate::snapshot::Snapshot;

/// Iterations of the time search that extrapolate from the block period
/// before falling back to bisection.
const EXTRAPOLATED_PROBES: usize = 8;

/// Snapshot queries over an engine and its chain.
#[derive(Clone)]
pub struct SnapshotApi {
    engine: Arc<Alien>,
    chain: Arc<dyn ChainReader>,
}

impl SnapshotApi {
    /// Creates the API.
    pub fn new(engine: Arc<Alien>, chain: Arc<dyn ChainReader>) -> Self {
        Self { engine, chain }
    }

    /// Snapshot at canonical block `number`, or at the head when `None`.
    pub fn get_snapshot(&self, number: Option<u64>) -> Result<Snapshot> {
        let header = match number {
            Some(n) => self.chain.header_by_number(n),
            None => self.chain.current_header(),
        }
        .ok_or(AlienError::UnknownBlock)?;
        self.engine
            .snapshot(self.chain.as_ref(), header.number, header.hash(), &[])
    }

    /// Snapshot at block `hash`.
    pub fn get_snapshot_at_hash(&self, hash: H256) -> Result<Snapshot> {
        let header = self
            .chain
            .header_by_hash(&hash)
            .ok_or(AlienError::UnknownBlock)?;
        self.engine
            .snapshot(self.chain.as_ref(), header.number, hash, &[])
    }

    /// Snapshot at canonical block `number`.
    pub fn get_snapshot_at_number(&self, number: u64) -> Result<Snapshot> {
        self.get_snapshot(Some(number))
    }

    /// Main-chain view for side chain `sc_hash` at the latest block whose
    /// time is not after `time`.
    pub fn get_snapshot_by_header_time(&self, time: u64, sc_hash: H256) -> Result<MainChainSnapshot> {
        let head = self
            .chain
            .current_header()
            .ok_or(AlienError::UnknownBlock)?;
        let number = self.search_by_time(head.number, time)?;
        let snap = self.get_snapshot(Some(number))?;

        let signers = snap
            .signers
            .iter()
            .map(|signer| {
                snap.sc_coinbase
                    .get(signer)
                    .and_then(|chains| chains.get(&sc_hash))
                    .copied()
                    .unwrap_or(*signer)
            })
            .collect();
        Ok(MainChainSnapshot {
            number: snap.number,
            loop_start_time: snap.loop_start_time,
            period: snap.period,
            signers,
            sc_notices: snap.sc_notices.get(&sc_hash).cloned().unwrap_or_default(),
        })
    }

    /// Latest canonical block at or below `head` with time not after `time`.
    fn search_by_time(&self, head: u64, time: u64) -> Result<u64> {
        let time_of = |n: u64| {
            self.chain
                .header_by_number(n)
                .map(|h| h.time)
                .ok_or(AlienError::UnknownBlock)
        };
        if time_of(head)? <= time {
            return Ok(head);
        }
        let period = self.engine.config().period.max(1);

        // invariant: time_of(lo) <= time < time_of(hi)
        let mut lo = 0u64;
        let mut hi = head;
        let mut probes = 0usize;
        while hi - lo > 1 {
            let guess = if probes < EXTRAPOLATED_PROBES {
                let hi_time = time_of(hi)?;
                hi.saturating_sub((hi_time - time) / period)
            } else {
                lo + (hi - lo) / 2
            };
            let mid = guess.clamp(lo + 1, hi - 1);
            probes += 1;
            if time_of(mid)? <= time {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        trace!(time, number = lo, probes, "Resolved block by header time");
        Ok(lo)
    }
}
