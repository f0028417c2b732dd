//! Side-chain bookkeeping on the main chain.
//!
//! A side chain is registered by a passed proposal. Main-chain signers then
//! register a coinbase for it, report its loops through confirmations, and
//! receipt the gas chargings rented to it. Once per loop the reports are
//! settled into per-coinbase scores that drive side-chain rewards.

use alien_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::command::{parse_address, parse_hash};
use crate::constants::{
    ether, SC_MAX_CONFIRMED_RECORD_LOOPS, SC_NOTICE_CLEAR_DELAY_LOOP_COUNT,
    SC_REWARD_EXPIRED_LOOP_COUNT,
};
use crate::snapshot::Snapshot;
use crate::types::{GasCharging, Proposal, SCConfirmation, SCSetCoinbase};

/// Rent paid to a side chain on top of its main-chain share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentReward {
    /// Amount added to the reward pool per settled loop
    pub rent_per_period: U256,
    /// Last block the rent is paid at
    pub max_reward_number: u64,
}

/// A registered side chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideChainRecord {
    /// Pending loop reports per side-chain block number
    pub record: BTreeMap<u64, Vec<SCConfirmation>>,
    /// Highest side-chain block agreed by a super-majority
    pub last_confirmed_number: u64,
    /// Highest side-chain block reported
    pub max_header_number: u64,
    /// Side-chain blocks settled per main-chain loop
    pub count_per_period: u64,
    /// Share of the main-chain miner reward per thousand
    pub reward_per_period: u64,
    /// Reward share per coinbase, keyed by the block they were settled at
    pub scores: BTreeMap<u64, BTreeMap<Address, u64>>,
    /// Active rents keyed by proposal hash
    pub rent: BTreeMap<H256, RentReward>,
}

impl SideChainRecord {
    /// Creates an empty record.
    pub fn new(count_per_period: u64, reward_per_period: u64) -> Self {
        Self {
            count_per_period,
            reward_per_period,
            ..Default::default()
        }
    }

    fn record_report(&mut self, report: &SCConfirmation) {
        let reports = self.record.entry(report.number).or_default();
        match reports.iter_mut().find(|r| r.coinbase == report.coinbase) {
            Some(existing) => *existing = report.clone(),
            None => reports.push(report.clone()),
        }
        self.max_header_number = self.max_header_number.max(report.number);
    }

    /// Settles pending reports, returning the agreed loop infos in order.
    fn settle(&mut self) -> Vec<Vec<String>> {
        let mut agreed = Vec::new();
        let pending: Vec<u64> = self
            .record
            .range(self.last_confirmed_number + 1..)
            .map(|(n, _)| *n)
            .collect();
        for number in pending {
            if agreed.len() as u64 >= self.count_per_period {
                break;
            }
            let Some(reports) = self.record.get(&number) else {
                continue;
            };
            let mut counts: BTreeMap<&Vec<String>, usize> = BTreeMap::new();
            for report in reports {
                *counts.entry(&report.loop_info).or_default() += 1;
            }
            let best = counts.into_iter().max_by_key(|(_, count)| *count);
            if let Some((loop_info, count)) = best {
                if count * 3 > reports.len() * 2 {
                    agreed.push(loop_info.clone());
                    self.last_confirmed_number = number;
                }
            }
        }
        agreed
    }

    /// Active rent paid at block `number`.
    pub fn active_rent(&self, number: u64) -> U256 {
        self.rent
            .values()
            .filter(|r| r.max_reward_number >= number)
            .fold(U256::ZERO, |acc, r| acc + r.rent_per_period)
    }
}

/// A gas charging announced to a side chain and the coinbases that
/// receipted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRecord {
    /// The charging
    pub charging: GasCharging,
    /// Side-chain coinbases that reported it credited
    pub receipts: BTreeSet<Address>,
    /// Main-chain block the receipts reached a super-majority at
    pub confirmed_at: Option<u64>,
}

impl NoticeRecord {
    /// Creates an unconfirmed notice.
    pub fn new(charging: GasCharging) -> Self {
        Self {
            charging,
            receipts: BTreeSet::new(),
            confirmed_at: None,
        }
    }

    /// Returns true until the receipts reach a super-majority.
    pub fn is_pending(&self) -> bool {
        self.confirmed_at.is_none()
    }
}

impl Snapshot {
    /// Returns true if `coinbase` is registered for `sc_hash` by some signer.
    pub fn is_side_chain_coinbase(&self, sc_hash: &H256, coinbase: &Address) -> bool {
        self.sc_coinbase
            .values()
            .any(|chains| chains.get(sc_hash) == Some(coinbase))
    }

    /// Coinbases registered for `sc_hash`.
    pub fn side_chain_coinbases(&self, sc_hash: &H256) -> BTreeSet<Address> {
        self.sc_coinbase
            .values()
            .filter_map(|chains| chains.get(sc_hash).copied())
            .collect()
    }

    /// Returns true if `sc_hash` is a registered side chain.
    pub fn is_side_chain(&self, sc_hash: &H256) -> bool {
        self.sc_records.contains_key(sc_hash)
    }

    pub(crate) fn apply_sc_set_coinbases(&mut self, items: &[SCSetCoinbase]) {
        for item in items {
            if item.add {
                self.sc_coinbase
                    .entry(item.signer)
                    .or_default()
                    .insert(item.hash, item.coinbase);
            } else if let Some(chains) = self.sc_coinbase.get_mut(&item.signer) {
                chains.remove(&item.hash);
                if chains.is_empty() {
                    self.sc_coinbase.remove(&item.signer);
                }
            }
        }
    }

    pub(crate) fn apply_sc_confirmations(&mut self, items: &[SCConfirmation], number: u64) {
        for item in items {
            if !self.is_side_chain_coinbase(&item.hash, &item.coinbase) {
                continue;
            }
            if let Some(record) = self.sc_records.get_mut(&item.hash) {
                if item.number > record.last_confirmed_number {
                    record.record_report(item);
                }
            }
        }

        if (number + 1) % self.config().max_signer_count == 0 {
            self.settle_side_chains(number);
        }
    }

    fn settle_side_chains(&mut self, number: u64) {
        for (sc_hash, record) in self.sc_records.iter_mut() {
            let agreed = record.settle();
            let mut appearances: BTreeMap<Address, u64> = BTreeMap::new();
            let mut total = 0u64;
            for token in agreed.iter().flatten() {
                if let Ok(coinbase) = parse_address(token) {
                    *appearances.entry(coinbase).or_default() += 1;
                    total += 1;
                }
            }
            if total == 0 {
                continue;
            }
            debug!(
                number,
                side_chain = %sc_hash,
                loops = agreed.len(),
                last_confirmed = record.last_confirmed_number,
                "Settled side-chain loops"
            );
            let scores = appearances
                .into_iter()
                .map(|(coinbase, n)| (coinbase, n * 100 / total))
                .collect();
            record.scores.insert(number, scores);
        }
    }

    pub(crate) fn apply_notice_confirmations(&mut self, items: &[SCConfirmation], number: u64) {
        for item in items {
            if !self.is_side_chain_coinbase(&item.hash, &item.coinbase) {
                continue;
            }
            let registered = self.side_chain_coinbases(&item.hash).len();
            let Some(notices) = self.sc_notices.get_mut(&item.hash) else {
                continue;
            };
            for token in &item.loop_info {
                let Ok(charging) = parse_hash(token) else {
                    continue;
                };
                let Some(notice) = notices.get_mut(&charging) else {
                    continue;
                };
                if !notice.is_pending() {
                    continue;
                }
                notice.receipts.insert(item.coinbase);
                if notice.receipts.len() * 3 > registered * 2 {
                    notice.confirmed_at = Some(number);
                }
            }
        }
    }

    pub(crate) fn record_local_chargings(&mut self, chargings: &[GasCharging]) {
        for charging in chargings {
            self.local_notice.insert(charging.hash, charging.clone());
        }
    }

    /// Starts the rent of a passed proposal. Returns false when the side
    /// chain is gone and the rent fee must be refunded.
    pub(crate) fn enact_rent(&mut self, proposal: &Proposal, number: u64) -> bool {
        let Some(record) = self.sc_records.get_mut(&proposal.sc_hash) else {
            return false;
        };
        record.rent.insert(
            proposal.hash,
            RentReward {
                rent_per_period: ether(proposal.sc_rent_rate),
                max_reward_number: number + proposal.sc_rent_length,
            },
        );
        self.sc_notices.entry(proposal.sc_hash).or_default().insert(
            proposal.hash,
            NoticeRecord::new(GasCharging {
                target: proposal.target_address,
                volume: proposal.sc_rent_fee,
                hash: proposal.hash,
            }),
        );
        true
    }

    pub(crate) fn remove_side_chain(&mut self, sc_hash: &H256) {
        self.sc_records.remove(sc_hash);
        self.sc_notices.remove(sc_hash);
        for chains in self.sc_coinbase.values_mut() {
            chains.remove(sc_hash);
        }
        self.sc_coinbase.retain(|_, chains| !chains.is_empty());
    }

    pub(crate) fn expire_side_chains(&mut self, number: u64) {
        let msc = self.config().max_signer_count;
        let score_window = SC_REWARD_EXPIRED_LOOP_COUNT * msc;
        let max_records = (SC_MAX_CONFIRMED_RECORD_LOOPS * msc) as usize;
        for record in self.sc_records.values_mut() {
            record
                .scores
                .retain(|settled, _| number.saturating_sub(*settled) <= score_window);
            let last = record.last_confirmed_number;
            record.record.retain(|n, _| *n > last);
            while record.record.len() > max_records {
                record.record.pop_last();
            }
            record.rent.retain(|_, r| r.max_reward_number >= number);
        }

        let clear_after = SC_NOTICE_CLEAR_DELAY_LOOP_COUNT * msc;
        for notices in self.sc_notices.values_mut() {
            notices.retain(|_, notice| {
                notice
                    .confirmed_at
                    .map_or(true, |at| at + clear_after > number)
            });
        }
    }

    /// Gas chargings of `sc_hash` still awaiting receipts.
    pub fn pending_notices(&self, sc_hash: &H256) -> Vec<&GasCharging> {
        self.sc_notices
            .get(sc_hash)
            .map(|notices| {
                notices
                    .values()
                    .filter(|n| n.is_pending())
                    .map(|n| &n.charging)
                    .collect()
            })
            .unwrap_or_default()
    }
}
