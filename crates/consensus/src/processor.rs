//! Turns the governance transactions of a block into header-extra records.
//!
//! The processor runs during finalize on the main chain, against the parent
//! snapshot. Transactions that are malformed or not allowed are skipped; a
//! block never fails because of a bad governance payload.

use alien_crypto::recover_sender;
use alien_types::{Address, Receipt, Transaction, H256, U256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::chain::{ChainReader, StateDb};
use crate::command::{self, GovernanceCommand, ProposalOptions};
use crate::constants::{
    ether, signer_block_reward, DEFAULT_SC_RENT_LENGTH, DEFAULT_VALIDATION_LOOP_CNT,
    MIN_SC_RENT_FEE,
};
use crate::extra::HeaderExtra;
use crate::snapshot::Snapshot;
use crate::types::{
    Confirmation, Declare, Proposal, ProposalType, SCConfirmation, SCSetCoinbase, Vote,
};

/// Length of a `0x`-prefixed address in loop info.
const LOOP_INFO_ADDRESS_LEN: usize = 42;
/// Length of a `0x`-prefixed hash in loop info.
const LOOP_INFO_HASH_LEN: usize = 66;

/// Records produced from the transactions of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEvents {
    /// Accepted votes
    pub votes: Vec<Vote>,
    /// Accepted confirmations
    pub confirmations: Vec<Confirmation>,
    /// Accepted proposals
    pub proposals: Vec<Proposal>,
    /// Accepted declares
    pub declares: Vec<Declare>,
    /// Stake updates of existing voters
    pub modify_predecessor_votes: Vec<Vote>,
    /// Side-chain loop reports
    pub side_chain_confirmations: Vec<SCConfirmation>,
    /// Side-chain coinbase registrations
    pub side_chain_set_coinbases: Vec<SCSetCoinbase>,
    /// Side-chain receipts of gas chargings
    pub side_chain_notice_confirmed: Vec<SCConfirmation>,
    /// Gas refunded per sender
    pub refund_gas: BTreeMap<Address, U256>,
}

impl BlockEvents {
    /// Appends the records to `extra`.
    pub fn fill(&self, extra: &mut HeaderExtra) {
        extra.current_block_votes.extend_from_slice(&self.votes);
        extra
            .current_block_confirmations
            .extend_from_slice(&self.confirmations);
        extra.current_block_proposals.extend_from_slice(&self.proposals);
        extra.current_block_declares.extend_from_slice(&self.declares);
        extra
            .modify_predecessor_votes
            .extend_from_slice(&self.modify_predecessor_votes);
        extra
            .side_chain_confirmations
            .extend_from_slice(&self.side_chain_confirmations);
        extra
            .side_chain_set_coinbases
            .extend_from_slice(&self.side_chain_set_coinbases);
        extra
            .side_chain_notice_confirmed
            .extend_from_slice(&self.side_chain_notice_confirmed);
    }
}

/// Governance processor for one main-chain block.
pub struct Processor<'a> {
    snap: &'a Snapshot,
    chain: &'a dyn ChainReader,
    number: u64,
    events: BlockEvents,
    stake_changed: BTreeSet<Address>,
}

impl<'a> Processor<'a> {
    /// Creates a processor for block `number` over the parent snapshot.
    pub fn new(snap: &'a Snapshot, chain: &'a dyn ChainReader, number: u64) -> Self {
        Self {
            snap,
            chain,
            number,
            events: BlockEvents::default(),
            stake_changed: BTreeSet::new(),
        }
    }

    /// Processes `txs` in order. Proposal deposits are debited from `state`.
    pub fn process(
        mut self,
        state: &mut dyn StateDb,
        txs: &[Transaction],
        receipts: &[Receipt],
    ) -> BlockEvents {
        let terminus = self.snap.config().is_terminus(self.number);
        for tx in txs {
            let hash = tx.hash();
            let receipt = receipts.iter().find(|r| r.tx_hash == hash);
            let sender = match recover_sender(tx) {
                Ok(sender) => sender,
                Err(e) => {
                    debug!(tx = %hash, error = %e, "Skipping transaction with bad signature");
                    continue;
                }
            };
            let Some(to) = tx.to else {
                continue;
            };

            let failed = !receipt.map_or(false, Receipt::is_success);
            if command::is_governance(&tx.data) && !(terminus && failed) {
                match command::parse(&tx.data) {
                    Ok(cmd) => self.handle(state, tx, receipt, sender, to, cmd),
                    Err(e) => trace!(tx = %hash, error = %e, "Ignoring governance payload"),
                }
            }

            if !tx.value.is_zero() {
                for party in [sender, to] {
                    if self.snap.is_voter(&party) {
                        self.stake_changed.insert(party);
                    }
                }
            }
        }

        for voter in std::mem::take(&mut self.stake_changed) {
            self.events.modify_predecessor_votes.push(Vote {
                voter,
                candidate: Address::ZERO,
                stake: state.balance(&voter),
            });
        }
        self.events
    }

    fn handle(
        &mut self,
        state: &mut dyn StateDb,
        tx: &Transaction,
        receipt: Option<&Receipt>,
        sender: Address,
        to: Address,
        cmd: GovernanceCommand,
    ) {
        match cmd {
            GovernanceCommand::Vote => self.vote(state, sender, to),
            GovernanceCommand::Confirm { number } => {
                if self.confirm(sender, number) {
                    self.refund(tx, receipt, sender);
                }
            }
            GovernanceCommand::Proposal(options) => self.propose(state, tx.hash(), sender, options),
            GovernanceCommand::Declare { hash, decision } => self.declare(sender, hash, decision),
            GovernanceCommand::SideChainConfirm {
                hash,
                number,
                loop_info,
            } => {
                if self.side_chain_confirm(sender, hash, number, loop_info) {
                    self.refund(tx, receipt, sender);
                }
            }
            GovernanceCommand::SideChainSetCoinbase { hash } => {
                self.set_coinbase(sender, to, hash, tx.value)
            }
        }
    }

    fn refund(&mut self, tx: &Transaction, receipt: Option<&Receipt>, sender: Address) {
        if let Some(receipt) = receipt.filter(|r| r.is_success()) {
            let gas = U256::from(receipt.gas_used) * tx.gas_price;
            *self.events.refund_gas.entry(sender).or_default() += gas;
        }
    }

    fn vote(&mut self, state: &dyn StateDb, voter: Address, candidate: Address) {
        let stake = state.balance(&voter);
        if stake < self.snap.min_voter_balance {
            trace!(voter = %voter, stake = %stake, "Vote below minimum balance");
            return;
        }
        if self.snap.config().candidates_gated() && !self.snap.is_candidate(&candidate) {
            trace!(voter = %voter, candidate = %candidate, "Vote for non-candidate");
            return;
        }
        self.events.votes.push(Vote {
            voter,
            candidate,
            stake,
        });
    }

    fn confirm(&mut self, signer: Address, number: u64) -> bool {
        let msc = self.snap.config().max_signer_count;
        if number > self.number || self.number - number > msc {
            return false;
        }
        let Some(header) = self.chain.header_by_number(number) else {
            return false;
        };
        let queue = match HeaderExtra::from_header(&header, self.snap.config()) {
            Ok(extra) => extra.signer_queue,
            Err(e) => {
                debug!(number, error = %e, "Confirmed block has malformed extra");
                return false;
            }
        };
        if !queue.contains(&signer) {
            return false;
        }
        self.events.confirmations.push(Confirmation {
            signer,
            block_number: number,
        });
        true
    }

    fn propose(
        &mut self,
        state: &mut dyn StateDb,
        hash: H256,
        proposer: Address,
        options: ProposalOptions,
    ) {
        if !self.snap.is_candidate(&proposer) {
            return;
        }
        let Some(kind) = options.proposal_type else {
            return;
        };
        if kind.requires_trantor() && !self.snap.config().is_trantor(self.number) {
            return;
        }

        let snap = self.snap;
        let proposal = Proposal {
            hash,
            received_number: self.number,
            current_deposit: snap.proposal_deposit,
            validation_loop_cnt: options
                .validation_loop_cnt
                .unwrap_or(DEFAULT_VALIDATION_LOOP_CNT),
            proposal_type: kind.as_u64(),
            proposer,
            target_address: match kind {
                ProposalType::RentSideChain => options.sc_rent_target.unwrap_or(Address::ZERO),
                _ => options.candidate.unwrap_or(Address::ZERO),
            },
            miner_reward_per_thousand: options
                .miner_reward_per_thousand
                .unwrap_or(snap.miner_reward),
            sc_hash: options.sc_hash.unwrap_or(H256::ZERO),
            sc_block_count_per_period: options.sc_block_count_per_period.unwrap_or(1),
            sc_block_reward_per_period: options.sc_block_reward_per_period.unwrap_or(0),
            min_voter_balance: options
                .min_voter_balance
                .unwrap_or_else(|| to_ether(snap.min_voter_balance)),
            proposal_deposit: options
                .proposal_deposit
                .unwrap_or_else(|| to_ether(snap.proposal_deposit)),
            sc_rent_fee: options.sc_rent_fee.unwrap_or(0),
            sc_rent_rate: options.sc_rent_rate.unwrap_or(1),
            sc_rent_length: options.sc_rent_length.unwrap_or(DEFAULT_SC_RENT_LENGTH),
            implement_number: options.implement_number.unwrap_or(0),
            declares: Vec::new(),
        };

        let valid = match kind {
            ProposalType::CandidateAdd | ProposalType::CandidateRemove => {
                !proposal.target_address.is_zero()
            }
            ProposalType::SideChainAdd | ProposalType::SideChainRemove => {
                !proposal.sc_hash.is_zero()
            }
            ProposalType::RentSideChain => {
                snap.is_side_chain(&proposal.sc_hash)
                    && !proposal.target_address.is_zero()
                    && proposal.sc_rent_fee >= MIN_SC_RENT_FEE
            }
            _ => true,
        };
        if !valid {
            trace!(proposal = %hash, proposal_type = kind.as_u64(), "Rejected invalid proposal");
            return;
        }

        let mut cost = proposal.current_deposit;
        if kind == ProposalType::RentSideChain {
            cost += ether(proposal.sc_rent_fee);
        }
        if state.balance(&proposer) < cost {
            trace!(proposal = %hash, proposer = %proposer, "Proposer cannot cover deposit");
            return;
        }
        state.sub_balance(&proposer, cost);
        debug!(proposal = %hash, proposer = %proposer, proposal_type = kind.as_u64(), "Accepted proposal");
        self.events.proposals.push(proposal);
    }

    fn declare(&mut self, declarer: Address, hash: H256, decision: bool) {
        if !self.snap.is_candidate(&declarer) {
            return;
        }
        let msc = self.snap.config().max_signer_count;
        let Some(proposal) = self.snap.proposals.get(&hash) else {
            return;
        };
        if proposal.deadline(msc) < self.number {
            return;
        }
        let duplicate = proposal.declares.iter().any(|d| d.declarer == declarer)
            || self
                .events
                .declares
                .iter()
                .any(|d| d.proposal_hash == hash && d.declarer == declarer);
        if duplicate {
            return;
        }
        self.events.declares.push(Declare {
            proposal_hash: hash,
            declarer,
            decision,
        });
    }

    fn side_chain_confirm(
        &mut self,
        coinbase: Address,
        hash: H256,
        number: u64,
        loop_info: Vec<String>,
    ) -> bool {
        if !self.snap.is_side_chain_coinbase(&hash, &coinbase) {
            return false;
        }
        let (signers, receipts): (Vec<String>, Vec<String>) = loop_info
            .into_iter()
            .filter(|token| {
                token.len() == LOOP_INFO_ADDRESS_LEN || token.len() == LOOP_INFO_HASH_LEN
            })
            .partition(|token| token.len() == LOOP_INFO_ADDRESS_LEN);

        if !signers.is_empty() {
            self.events.side_chain_confirmations.push(SCConfirmation {
                hash,
                coinbase,
                number,
                loop_info: signers,
            });
        }
        if !receipts.is_empty() {
            self.events.side_chain_notice_confirmed.push(SCConfirmation {
                hash,
                coinbase,
                number: self.number,
                loop_info: receipts,
            });
        }
        true
    }

    fn set_coinbase(&mut self, signer: Address, coinbase: Address, hash: H256, value: U256) {
        if !self.snap.is_candidate(&signer)
            || !self.snap.is_side_chain(&hash)
            || value < signer_block_reward(self.snap.config().period)
        {
            return;
        }
        self.events.side_chain_set_coinbases.push(SCSetCoinbase {
            hash,
            signer,
            coinbase,
            add: true,
        });
    }
}

fn to_ether(wei: U256) -> u64 {
    let whole = wei / ether(1);
    u64::try_from(whole).unwrap_or(u64::MAX)
}
