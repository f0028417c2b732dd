//! Governance state at a block.
//!
//! A [`Snapshot`] is derived from its parent by [`Snapshot::apply`], which
//! replays the records each header announces in its extra. Snapshots are
//! values: `apply` works on a copy and the caller's snapshot never changes,
//! so cached snapshots stay valid across reorgs.
//!
//! Every 360 blocks a snapshot is persisted as JSON under
//! `"alien-" || hash`. Maps are ordered so the same snapshot always
//! serializes to the same bytes.

use alien_config::AlienConfig;
use alien_storage::KeyValueStore;
use alien_types::{Address, Header, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::constants::{
    ether, AUTO_REWARD_CREDIT, MAX_PUNISHMENT, MAX_UNCHECK_BALANCE_VOTE_COUNT,
    MINER_REWARD_PER_THOUSAND, MISSING_PUBLISH_CREDIT, PROPOSAL_REFUND_DELAY_LOOP_COUNT,
    SIGN_REWARD_CREDIT, SNAPSHOT_KEY_PREFIX,
};
use crate::error::{AlienError, Result};
use crate::extra::HeaderExtra;
use crate::seal::SignatureCache;
use crate::side_chain::{NoticeRecord, SideChainRecord};
use crate::types::{Confirmation, Declare, GasCharging, Proposal, ProposalType, Vote};

/// Key of the checkpoint for `hash`.
pub fn snapshot_key(hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(SNAPSHOT_KEY_PREFIX.len() + 32);
    key.extend_from_slice(SNAPSHOT_KEY_PREFIX);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Governance state after a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(skip)]
    config: Arc<AlienConfig>,

    /// Loops between two tally elections
    pub loop_count_recalculate_signers: u64,
    /// Seconds per block
    pub period: u64,
    /// Block number
    pub number: u64,
    /// Highest block confirmed by a super-majority
    pub confirmed_number: u64,
    /// Block hash
    pub hash: H256,
    /// Hashes of the last `2 * max_signer_count` blocks, oldest first
    pub history_hash: Vec<H256>,
    /// Rotation in effect
    pub signers: Vec<Address>,
    /// Active vote of each voter
    pub votes: BTreeMap<Address, Vote>,
    /// Sum of active stakes per candidate
    pub tally: BTreeMap<Address, U256>,
    /// Block of each voter's latest vote
    pub voters: BTreeMap<Address, u64>,
    /// Addresses eligible for election
    pub candidates: BTreeSet<Address>,
    /// Liveness debt per signer
    pub punished: BTreeMap<Address, u64>,
    /// Confirmers of recent blocks
    pub confirmations: BTreeMap<u64, Vec<Address>>,
    /// Open proposals
    pub proposals: BTreeMap<H256, Proposal>,
    /// Time of the block
    pub header_time: u64,
    /// Start time of the current loop
    pub loop_start_time: u64,
    /// Side-chain coinbase of each main-chain signer, per side chain
    #[serde(rename = "scCoinbase")]
    pub sc_coinbase: BTreeMap<Address, BTreeMap<H256, Address>>,
    /// Registered side chains
    #[serde(rename = "scRecordMap")]
    pub sc_records: BTreeMap<H256, SideChainRecord>,
    /// Gas chargings announced to each side chain
    #[serde(rename = "scNoticeMap")]
    pub sc_notices: BTreeMap<H256, BTreeMap<H256, NoticeRecord>>,
    /// Chargings already credited on this side chain
    pub local_notice: BTreeMap<H256, GasCharging>,
    /// Sealer share of the block reward per thousand
    pub miner_reward: u64,
    /// Minimum balance of a voter
    #[serde(rename = "minVB")]
    pub min_voter_balance: U256,
    /// Deposit taken from each proposer
    pub proposal_deposit: U256,
    /// Refunds due per block
    pub proposal_refund: BTreeMap<u64, BTreeMap<Address, U256>>,
}

impl Snapshot {
    /// Builds the snapshot of the genesis block.
    pub fn genesis(
        config: Arc<AlienConfig>,
        genesis: &Header,
        votes: &[Vote],
        min_voter_balance: U256,
    ) -> Self {
        let hash = genesis.hash();
        let msc = config.max_signer_count as usize;
        let signers = if config.self_vote_signers.is_empty() {
            Vec::new()
        } else {
            (0..msc)
                .map(|i| config.self_vote_signers[i % config.self_vote_signers.len()])
                .collect()
        };

        let mut snap = Self {
            loop_count_recalculate_signers: config.loop_count_recalculate_signers,
            period: config.period,
            number: genesis.number,
            confirmed_number: 0,
            hash,
            history_hash: vec![hash],
            signers,
            votes: BTreeMap::new(),
            tally: BTreeMap::new(),
            voters: BTreeMap::new(),
            candidates: BTreeSet::new(),
            punished: BTreeMap::new(),
            confirmations: BTreeMap::new(),
            proposals: BTreeMap::new(),
            header_time: genesis.time,
            loop_start_time: config.genesis_timestamp,
            sc_coinbase: BTreeMap::new(),
            sc_records: BTreeMap::new(),
            sc_notices: BTreeMap::new(),
            local_notice: BTreeMap::new(),
            miner_reward: MINER_REWARD_PER_THOUSAND,
            min_voter_balance,
            proposal_deposit: crate::constants::proposal_deposit(),
            proposal_refund: BTreeMap::new(),
            config,
        };
        for vote in votes {
            snap.add_tally(vote.candidate, vote.stake);
            snap.votes.insert(vote.voter, vote.clone());
            snap.voters.insert(vote.voter, genesis.number);
            snap.candidates.insert(vote.voter);
        }
        snap
    }

    /// Engine parameters this snapshot was built with.
    pub fn config(&self) -> &AlienConfig {
        &self.config
    }

    pub(crate) fn with_config(mut self, config: Arc<AlienConfig>) -> Self {
        self.config = config;
        self
    }

    fn max_signer_count(&self) -> u64 {
        self.config.max_signer_count
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Loads the checkpoint stored for `hash`.
    pub fn load(
        config: Arc<AlienConfig>,
        db: &dyn KeyValueStore,
        hash: &H256,
    ) -> Result<Option<Self>> {
        match db.get(&snapshot_key(hash))? {
            Some(blob) => {
                let snap: Snapshot = serde_json::from_slice(&blob)?;
                Ok(Some(snap.with_config(config)))
            }
            None => Ok(None),
        }
    }

    /// Stores this snapshot as the checkpoint of its block.
    pub fn store(&self, db: &dyn KeyValueStore) -> Result<()> {
        let blob = serde_json::to_vec(self)?;
        db.put(&snapshot_key(&self.hash), &blob)?;
        debug!(number = self.number, hash = %self.hash, bytes = blob.len(), "Stored snapshot checkpoint");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns true if `address` may be elected.
    pub fn is_candidate(&self, address: &Address) -> bool {
        self.candidates.contains(address)
    }

    /// Returns true if `address` has an active vote.
    pub fn is_voter(&self, address: &Address) -> bool {
        self.voters.contains_key(address)
    }

    /// Returns true if `signer` owns the slot covering `time`.
    pub fn in_turn(&self, signer: &Address, time: u64) -> bool {
        in_turn_signer(&self.signers, self.loop_start_time, self.period, time) == Some(*signer)
    }

    /// Signers that skipped their slot between `last` and `current`, using
    /// the rotation of this snapshot.
    ///
    /// Within a loop these are the signers between `last` and `current`. At a
    /// loop boundary they are the signers after `last` at the end of the old
    /// rotation.
    pub fn signer_missing(&self, last: &Address, current: &Address, new_loop: bool) -> Vec<Address> {
        let mut missing = Vec::new();
        if new_loop {
            for signer in self.signers.iter().rev() {
                if signer == last {
                    break;
                }
                missing.push(*signer);
            }
        } else {
            let mut recording = false;
            for signer in &self.signers {
                if signer == last {
                    recording = true;
                    continue;
                }
                if signer == current {
                    break;
                }
                if recording {
                    missing.push(*signer);
                }
            }
        }
        missing
    }

    /// Highest block, looking back from this snapshot, confirmed by more
    /// than two thirds of the signers once `confirmations` are added.
    pub fn last_confirmed_block_number(&self, confirmations: &[Confirmation]) -> Option<u64> {
        let mut merged = self.confirmations.clone();
        for confirmation in confirmations {
            let signers = merged.entry(confirmation.block_number).or_default();
            if !signers.contains(&confirmation.signer) {
                signers.push(confirmation.signer);
            }
        }

        let threshold = (self.max_signer_count() * 2 / 3) as usize;
        let window = (self.max_signer_count() * 2 / 3).saturating_sub(1).max(1);
        (0..window)
            .map_while(|back| self.number.checked_sub(back))
            .find(|n| merged.get(n).map_or(false, |s| s.len() > threshold))
    }

    /// Rewards of the eligible voters of `coinbase` at block `number`.
    ///
    /// A voter is eligible when it votes for `coinbase` and its vote is older
    /// than one loop.
    pub fn vote_rewards(
        &self,
        coinbase: &Address,
        number: u64,
        voter_reward: U256,
    ) -> Result<BTreeMap<Address, U256>> {
        let Some(cutoff) = number.checked_sub(self.max_signer_count()) else {
            return Ok(BTreeMap::new());
        };
        let mut stakes = BTreeMap::new();
        let mut all_stake = U256::ZERO;
        for vote in self.votes.values() {
            let seasoned = self.voters.get(&vote.voter).map_or(false, |n| *n < cutoff);
            if vote.candidate == *coinbase && seasoned {
                all_stake += vote.stake;
                stakes.insert(vote.voter, vote.stake);
            }
        }
        if stakes.is_empty() {
            return Ok(stakes);
        }
        if all_stake.is_zero() {
            return Err(AlienError::AllStakeMissing);
        }
        Ok(stakes
            .into_iter()
            .map(|(voter, stake)| (voter, stake * voter_reward / all_stake))
            .collect())
    }

    // =========================================================================
    // Apply
    // =========================================================================

    /// Derives the snapshot after `headers`.
    pub fn apply(&self, headers: &[Header], signatures: &SignatureCache) -> Result<Snapshot> {
        let Some(first) = headers.first() else {
            return Ok(self.clone());
        };
        for pair in headers.windows(2) {
            if pair[1].number != pair[0].number + 1 {
                return Err(AlienError::NonContiguousBatch {
                    expected: pair[0].number + 1,
                    actual: pair[1].number,
                });
            }
        }
        if first.number != self.number + 1 {
            return Err(AlienError::WrongAncestor {
                snapshot: self.number,
                header: first.number,
            });
        }

        let mut snap = self.clone();
        for header in headers {
            snap.apply_header(header, signatures)?;
        }
        trace!(from = self.number, to = snap.number, "Applied headers to snapshot");
        Ok(snap)
    }

    fn apply_header(&mut self, header: &Header, signatures: &SignatureCache) -> Result<()> {
        let number = header.number;
        let signer = signatures.recover(header)?;
        if signer != header.coinbase && !self.config.tolerates_coinbase_mismatch(number) {
            return Err(AlienError::Unauthorized(signer));
        }
        let extra = HeaderExtra::from_header(header, &self.config)?;
        let hash = header.hash();

        self.number = number;
        self.hash = hash;
        self.header_time = header.time;
        self.loop_start_time = extra.loop_start_time;
        self.signers = extra.signer_queue.clone();
        self.confirmed_number = extra.confirmed_block_number;
        self.push_history(hash);

        self.apply_confirmations(&extra.current_block_confirmations);
        self.apply_votes(&extra.current_block_votes, number);
        self.apply_modify_predecessor_votes(&extra.modify_predecessor_votes);
        self.apply_punishment(&extra.signer_missing, &header.coinbase, number);
        self.apply_proposals(&extra.current_block_proposals, number);
        self.apply_declares(&extra.current_block_declares, number);

        self.apply_sc_set_coinbases(&extra.side_chain_set_coinbases);
        self.apply_sc_confirmations(&extra.side_chain_confirmations, number);
        self.apply_notice_confirmations(&extra.side_chain_notice_confirmed, number);
        self.record_local_chargings(&extra.side_chain_charging);

        self.resolve_proposals(number);
        // paid by the reward engine of this block
        self.proposal_refund.remove(&number);

        self.expire_votes(number);
        self.expire_confirmations(number);
        self.expire_side_chains(number);
        self.verify_tally()
    }

    fn push_history(&mut self, hash: H256) {
        self.history_hash.push(hash);
        let cap = (self.max_signer_count() * 2) as usize;
        if self.history_hash.len() > cap {
            let excess = self.history_hash.len() - cap;
            self.history_hash.drain(..excess);
        }
    }

    fn add_tally(&mut self, candidate: Address, stake: U256) {
        if stake.is_zero() {
            return;
        }
        *self.tally.entry(candidate).or_default() += stake;
    }

    fn sub_tally(&mut self, candidate: &Address, stake: U256) {
        if let Some(total) = self.tally.get_mut(candidate) {
            *total = total.saturating_sub(stake);
            if total.is_zero() {
                self.tally.remove(candidate);
            }
        }
    }

    fn apply_confirmations(&mut self, confirmations: &[Confirmation]) {
        for confirmation in confirmations {
            let signers = self
                .confirmations
                .entry(confirmation.block_number)
                .or_default();
            if !signers.contains(&confirmation.signer) {
                signers.push(confirmation.signer);
            }
        }
    }

    fn apply_votes(&mut self, votes: &[Vote], number: u64) {
        let open = !self.config.candidates_gated();
        for vote in votes {
            if let Some(previous) = self.votes.get(&vote.voter).cloned() {
                self.sub_tally(&previous.candidate, previous.stake);
            }
            self.add_tally(vote.candidate, vote.stake);
            if open {
                self.candidates.insert(vote.candidate);
            }
            self.votes.insert(vote.voter, vote.clone());
            self.voters.insert(vote.voter, number);
        }
    }

    fn apply_modify_predecessor_votes(&mut self, votes: &[Vote]) {
        for update in votes {
            let Some(previous) = self.votes.get(&update.voter).cloned() else {
                continue;
            };
            self.sub_tally(&previous.candidate, previous.stake);
            self.add_tally(previous.candidate, update.stake);
            self.votes.insert(
                update.voter,
                Vote {
                    voter: update.voter,
                    candidate: previous.candidate,
                    stake: update.stake,
                },
            );
        }
    }

    fn apply_punishment(&mut self, missing: &[Address], coinbase: &Address, number: u64) {
        for signer in missing {
            let debt = self.punished.entry(*signer).or_insert(0);
            *debt = (*debt + MISSING_PUBLISH_CREDIT).min(MAX_PUNISHMENT);
        }
        if let Some(debt) = self.punished.get_mut(coinbase) {
            if *debt > SIGN_REWARD_CREDIT {
                *debt -= SIGN_REWARD_CREDIT;
            } else {
                self.punished.remove(coinbase);
            }
        }
        self.punished.retain(|_, debt| {
            if *debt > AUTO_REWARD_CREDIT {
                *debt -= AUTO_REWARD_CREDIT;
                true
            } else {
                false
            }
        });
        if self.config.is_trantor_activation(number) {
            info!(number, cleared = self.punished.len(), "Trantor fork clears the punishment ledger");
            self.punished.clear();
        }
    }

    fn apply_proposals(&mut self, proposals: &[Proposal], number: u64) {
        for proposal in proposals {
            let mut proposal = proposal.clone();
            proposal.received_number = number;
            proposal.declares.clear();
            self.proposals.insert(proposal.hash, proposal);
        }
    }

    fn apply_declares(&mut self, declares: &[Declare], number: u64) {
        let msc = self.max_signer_count();
        for declare in declares {
            if !self.candidates.contains(&declare.declarer) {
                continue;
            }
            let Some(proposal) = self.proposals.get_mut(&declare.proposal_hash) else {
                continue;
            };
            if proposal.deadline(msc) < number
                || proposal.declares.iter().any(|d| d.declarer == declare.declarer)
            {
                continue;
            }
            proposal.declares.push(declare.clone());
        }
    }

    fn schedule_refund(&mut self, at: u64, proposer: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        *self
            .proposal_refund
            .entry(at)
            .or_default()
            .entry(proposer)
            .or_default() += amount;
    }

    fn resolve_proposals(&mut self, number: u64) {
        let msc = self.max_signer_count();
        let due: Vec<H256> = self
            .proposals
            .values()
            .filter(|p| p.deadline(msc) + 1 == number)
            .map(|p| p.hash)
            .collect();
        if due.is_empty() {
            return;
        }

        let total = self.tally.values().fold(U256::ZERO, |acc, s| acc + *s);
        let refund_at = number + PROPOSAL_REFUND_DELAY_LOOP_COUNT * msc;
        for hash in due {
            let Some(proposal) = self.proposals.remove(&hash) else {
                continue;
            };
            self.schedule_refund(refund_at, proposal.proposer, proposal.current_deposit);

            let yes = proposal
                .declares
                .iter()
                .filter(|d| d.decision)
                .filter_map(|d| self.tally.get(&d.declarer))
                .fold(U256::ZERO, |acc, s| acc + *s);
            let passed = yes.saturating_mul(U256::from(3u64)) > total.saturating_mul(U256::from(2u64));
            info!(
                number,
                proposal = %hash,
                proposal_type = proposal.proposal_type,
                declares = proposal.declares.len(),
                passed,
                "Resolved proposal"
            );

            if passed {
                self.enact(&proposal, number, refund_at);
            } else if proposal.kind() == Some(ProposalType::RentSideChain) {
                self.schedule_refund(refund_at, proposal.proposer, ether(proposal.sc_rent_fee));
            }
        }
    }

    fn enact(&mut self, proposal: &Proposal, number: u64, refund_at: u64) {
        let gated = self.config.candidates_gated();
        match proposal.kind() {
            Some(ProposalType::CandidateAdd) => {
                if gated {
                    self.candidates.insert(proposal.target_address);
                }
            }
            Some(ProposalType::CandidateRemove) => {
                if gated {
                    self.candidates.remove(&proposal.target_address);
                }
            }
            Some(ProposalType::MinerRewardDistributionModify) => {
                self.miner_reward = proposal.miner_reward_per_thousand;
            }
            Some(ProposalType::SideChainAdd) => {
                self.sc_records.entry(proposal.sc_hash).or_insert_with(|| {
                    SideChainRecord::new(
                        proposal.sc_block_count_per_period,
                        proposal.sc_block_reward_per_period,
                    )
                });
            }
            Some(ProposalType::SideChainRemove) => self.remove_side_chain(&proposal.sc_hash),
            Some(ProposalType::MinVoterBalanceModify) => {
                self.min_voter_balance = ether(proposal.min_voter_balance);
            }
            Some(ProposalType::ProposalDepositModify) => {
                self.proposal_deposit = ether(proposal.proposal_deposit);
            }
            Some(ProposalType::RentSideChain) => {
                if !self.enact_rent(proposal, number) {
                    self.schedule_refund(refund_at, proposal.proposer, ether(proposal.sc_rent_fee));
                }
            }
            None => {}
        }
    }

    fn expire_votes(&mut self, number: u64) {
        let epoch = self.config.epoch;
        let check_balance = self.voters.len() > MAX_UNCHECK_BALANCE_VOTE_COUNT;
        let expired: Vec<Vote> = self
            .voters
            .iter()
            .filter_map(|(voter, voted_at)| {
                let vote = self.votes.get(voter)?;
                let stale = number.saturating_sub(*voted_at) > epoch;
                let poor = check_balance && vote.stake < self.min_voter_balance;
                (stale || poor).then(|| vote.clone())
            })
            .collect();
        if expired.is_empty() {
            return;
        }
        // keep at least one loop worth of voters
        if ((self.voters.len() - expired.len()) as u64) < self.max_signer_count() {
            return;
        }
        debug!(number, expired = expired.len(), "Expiring votes");
        for vote in expired {
            self.sub_tally(&vote.candidate, vote.stake);
            self.votes.remove(&vote.voter);
            self.voters.remove(&vote.voter);
        }
    }

    fn expire_confirmations(&mut self, number: u64) {
        let msc = self.max_signer_count();
        if number > msc {
            self.confirmations
                .retain(|confirmed, _| number.saturating_sub(*confirmed) <= msc);
        }
    }

    fn verify_tally(&self) -> Result<()> {
        let mut expected: BTreeMap<Address, U256> = BTreeMap::new();
        for vote in self.votes.values() {
            *expected.entry(vote.candidate).or_default() += vote.stake;
        }
        expected.retain(|_, stake| !stake.is_zero());
        if expected != self.tally {
            return Err(AlienError::IncorrectTally);
        }
        Ok(())
    }
}

/// The owner of the slot covering `time` in a rotation starting at
/// `loop_start_time`.
pub fn in_turn_signer(
    queue: &[Address],
    loop_start_time: u64,
    period: u64,
    time: u64,
) -> Option<Address> {
    if queue.is_empty() || period == 0 || time < loop_start_time {
        return None;
    }
    let slot = ((time - loop_start_time) / period) % queue.len() as u64;
    queue.get(slot as usize).copied()
}

/// Signers that skipped their slot between `last` and `current` from the
/// Trantor fork on.
///
/// The rotation searched is the parent's queue twice, or the grandparent's
/// queue followed by the parent's when the two differ.
pub fn signer_missing_trantor(
    last: &Address,
    current: &Address,
    parent_queue: &[Address],
    grandparent_queue: Option<&[Address]>,
) -> Vec<Address> {
    let mut rotation: Vec<Address> = match grandparent_queue {
        Some(previous) if !previous.is_empty() && previous != parent_queue => previous.to_vec(),
        _ => parent_queue.to_vec(),
    };
    rotation.extend_from_slice(parent_queue);

    let mut missing = Vec::new();
    let mut recording = false;
    for signer in rotation {
        if !recording {
            recording = signer == *last;
            continue;
        }
        if signer == *current {
            break;
        }
        missing.push(signer);
    }
    missing
}
