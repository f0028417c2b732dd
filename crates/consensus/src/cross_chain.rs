//! Side-chain access to the main chain.

use alien_types::{Address, H256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::side_chain::NoticeRecord;

/// The part of a main-chain snapshot a side chain needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainChainSnapshot {
    /// Main-chain block the snapshot belongs to
    pub number: u64,
    /// Start time of the main-chain loop
    pub loop_start_time: u64,
    /// Main-chain block period
    pub period: u64,
    /// Side-chain coinbases in main-chain rotation order
    pub signers: Vec<Address>,
    /// Gas chargings announced to this side chain
    pub sc_notices: BTreeMap<H256, NoticeRecord>,
}

/// Client for the main chain a side chain reports to.
#[async_trait]
pub trait MainChainClient: Send + Sync {
    /// Main-chain snapshot at the latest block not newer than `time`, seen
    /// from side chain `sc_hash`.
    async fn snapshot_by_header_time(&self, time: u64, sc_hash: H256) -> Result<MainChainSnapshot>;

    /// Submits a signed raw transaction.
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<H256>;

    /// Next nonce of `address` on the main chain.
    async fn transaction_count(&self, address: Address) -> Result<u64>;
}

/// What a side-chain sealer last learned from the main chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainChainView {
    /// Main-chain loop start time
    pub loop_start_time: u64,
    /// Main-chain period
    pub period: u64,
    /// Main-chain rotation length
    pub signer_length: u64,
    /// Next main-chain nonce of the sealer, once known
    pub nonce: Option<u64>,
    /// Last side-chain block reported to the main chain
    pub last_confirmed_loop: u64,
}

impl MainChainView {
    /// Refreshes the loop parameters from `snap`.
    pub fn observe(&mut self, snap: &MainChainSnapshot) {
        self.loop_start_time = snap.loop_start_time;
        self.period = snap.period;
        self.signer_length = snap.signers.len() as u64;
    }
}
