//! Governance records carried in the header extra and the snapshot.
//!
//! Every record is an RLP list with a fixed item order. [`Proposal`] is the
//! one record whose shape depends on the block: after the Trantor fork it
//! carries six more items, so its codec takes a `post_trantor` flag instead
//! of implementing [`Encodable`] directly.

use alien_types::uint::{append_u256, u256_at};
use alien_types::{Address, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

fn expect_list(rlp: &Rlp<'_>, items: usize) -> Result<(), DecoderError> {
    if !rlp.is_list() {
        return Err(DecoderError::RlpExpectedToBeList);
    }
    if rlp.item_count()? != items {
        return Err(DecoderError::RlpIncorrectListLen);
    }
    Ok(())
}

/// A stake-weighted vote for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Account that voted
    pub voter: Address,
    /// Account voted for
    pub candidate: Address,
    /// Voter balance when the vote was accepted
    pub stake: U256,
}

impl Encodable for Vote {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.voter);
        s.append(&self.candidate);
        append_u256(s, &self.stake);
    }
}

impl Decodable for Vote {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 3)?;
        Ok(Self {
            voter: rlp.val_at(0)?,
            candidate: rlp.val_at(1)?,
            stake: u256_at(rlp, 2)?,
        })
    }
}

/// A signer vouching for an earlier block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Confirming signer
    pub signer: Address,
    /// Confirmed block
    pub block_number: u64,
}

impl Encodable for Confirmation {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.signer);
        s.append(&self.block_number);
    }
}

impl Decodable for Confirmation {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 2)?;
        Ok(Self {
            signer: rlp.val_at(0)?,
            block_number: rlp.val_at(1)?,
        })
    }
}

/// A candidate's decision on a pending proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declare {
    /// Proposal the decision is about
    pub proposal_hash: H256,
    /// Declaring candidate
    pub declarer: Address,
    /// `true` for yes
    pub decision: bool,
}

impl Encodable for Declare {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.proposal_hash);
        s.append(&self.declarer);
        s.append(&self.decision);
    }
}

impl Decodable for Declare {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 3)?;
        Ok(Self {
            proposal_hash: rlp.val_at(0)?,
            declarer: rlp.val_at(1)?,
            decision: rlp.val_at(2)?,
        })
    }
}

/// Kinds of governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    /// Admit `target_address` to the candidate set
    CandidateAdd = 1,
    /// Remove `target_address` from the candidate set
    CandidateRemove = 2,
    /// Change the sealer's share of the block reward
    MinerRewardDistributionModify = 3,
    /// Register side chain `sc_hash`
    SideChainAdd = 4,
    /// Deregister side chain `sc_hash`
    SideChainRemove = 5,
    /// Change the minimum voter balance
    MinVoterBalanceModify = 6,
    /// Change the proposal deposit
    ProposalDepositModify = 7,
    /// Rent block space on side chain `sc_hash`
    RentSideChain = 8,
}

impl ProposalType {
    /// Maps the wire value back to a type.
    pub fn from_u64(value: u64) -> Option<Self> {
        Some(match value {
            1 => Self::CandidateAdd,
            2 => Self::CandidateRemove,
            3 => Self::MinerRewardDistributionModify,
            4 => Self::SideChainAdd,
            5 => Self::SideChainRemove,
            6 => Self::MinVoterBalanceModify,
            7 => Self::ProposalDepositModify,
            8 => Self::RentSideChain,
            _ => return None,
        })
    }

    /// The wire value.
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    /// Types whose parameters only exist in the post-Trantor encoding.
    pub fn requires_trantor(self) -> bool {
        matches!(
            self,
            Self::MinVoterBalanceModify | Self::ProposalDepositModify | Self::RentSideChain
        )
    }
}

/// A governance proposal.
///
/// `declares` is snapshot-only state and never part of the header encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Hash of the proposing transaction
    pub hash: H256,
    /// Block that carried the proposal
    pub received_number: u64,
    /// Deposit taken from the proposer
    pub current_deposit: U256,
    /// Loops the proposal stays open
    pub validation_loop_cnt: u64,
    /// Wire value of [`ProposalType`]
    pub proposal_type: u64,
    /// Proposing candidate
    pub proposer: Address,
    /// Candidate to add or remove, or the rent target
    pub target_address: Address,
    /// New sealer share per thousand
    pub miner_reward_per_thousand: u64,
    /// Side chain genesis hash
    pub sc_hash: H256,
    /// Side-chain numbers scored per main-chain loop
    pub sc_block_count_per_period: u64,
    /// Side-chain share of the sealer reward per thousand
    pub sc_block_reward_per_period: u64,
    /// New minimum voter balance, in ether
    pub min_voter_balance: u64,
    /// New proposal deposit, in ether
    pub proposal_deposit: u64,
    /// Rent fee, in ether
    pub sc_rent_fee: u64,
    /// Rent reward per period, in ether
    pub sc_rent_rate: u64,
    /// Rent length in blocks
    pub sc_rent_length: u64,
    /// Block the proposer wants the change to take effect at
    pub implement_number: u64,
    /// Decisions collected so far
    #[serde(default)]
    pub declares: Vec<Declare>,
}

impl Proposal {
    /// Item count before the Trantor fork.
    pub const PRE_TRANTOR_ITEMS: usize = 11;
    /// Item count from the Trantor fork on.
    pub const POST_TRANTOR_ITEMS: usize = 17;

    /// The decoded type, if known.
    pub fn kind(&self) -> Option<ProposalType> {
        ProposalType::from_u64(self.proposal_type)
    }

    /// Last block at which declares are accepted.
    pub fn deadline(&self, max_signer_count: u64) -> u64 {
        self.received_number + self.validation_loop_cnt * max_signer_count
    }

    /// Appends the proposal in the layout selected by `post_trantor`.
    pub fn rlp_append(&self, s: &mut RlpStream, post_trantor: bool) {
        s.begin_list(if post_trantor {
            Self::POST_TRANTOR_ITEMS
        } else {
            Self::PRE_TRANTOR_ITEMS
        });
        s.append(&self.hash);
        s.append(&self.received_number);
        append_u256(s, &self.current_deposit);
        s.append(&self.validation_loop_cnt);
        s.append(&self.proposal_type);
        s.append(&self.proposer);
        s.append(&self.target_address);
        s.append(&self.miner_reward_per_thousand);
        s.append(&self.sc_hash);
        s.append(&self.sc_block_count_per_period);
        s.append(&self.sc_block_reward_per_period);
        if post_trantor {
            s.append(&self.min_voter_balance);
            s.append(&self.proposal_deposit);
            s.append(&self.sc_rent_fee);
            s.append(&self.sc_rent_rate);
            s.append(&self.sc_rent_length);
            s.append(&self.implement_number);
        }
    }

    /// Decodes the proposal in the layout selected by `post_trantor`.
    pub fn decode(rlp: &Rlp<'_>, post_trantor: bool) -> Result<Self, DecoderError> {
        expect_list(
            rlp,
            if post_trantor {
                Self::POST_TRANTOR_ITEMS
            } else {
                Self::PRE_TRANTOR_ITEMS
            },
        )?;
        let mut proposal = Self {
            hash: rlp.val_at(0)?,
            received_number: rlp.val_at(1)?,
            current_deposit: u256_at(rlp, 2)?,
            validation_loop_cnt: rlp.val_at(3)?,
            proposal_type: rlp.val_at(4)?,
            proposer: rlp.val_at(5)?,
            target_address: rlp.val_at(6)?,
            miner_reward_per_thousand: rlp.val_at(7)?,
            sc_hash: rlp.val_at(8)?,
            sc_block_count_per_period: rlp.val_at(9)?,
            sc_block_reward_per_period: rlp.val_at(10)?,
            ..Default::default()
        };
        if post_trantor {
            proposal.min_voter_balance = rlp.val_at(11)?;
            proposal.proposal_deposit = rlp.val_at(12)?;
            proposal.sc_rent_fee = rlp.val_at(13)?;
            proposal.sc_rent_rate = rlp.val_at(14)?;
            proposal.sc_rent_length = rlp.val_at(15)?;
            proposal.implement_number = rlp.val_at(16)?;
        }
        Ok(proposal)
    }
}

/// A side-chain loop reported by one of its coinbases.
///
/// In notice confirmations the same record lists charging hashes instead of
/// coinbases in `loop_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SCConfirmation {
    /// Side chain genesis hash
    pub hash: H256,
    /// Reporting coinbase
    pub coinbase: Address,
    /// Side-chain loop-end number, or the main-chain block for notices
    pub number: u64,
    /// `0x`-prefixed tokens
    pub loop_info: Vec<String>,
}

impl Encodable for SCConfirmation {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.hash);
        s.append(&self.coinbase);
        s.append(&self.number);
        s.begin_list(self.loop_info.len());
        for token in &self.loop_info {
            s.append(token);
        }
    }
}

impl Decodable for SCConfirmation {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 4)?;
        Ok(Self {
            hash: rlp.val_at(0)?,
            coinbase: rlp.val_at(1)?,
            number: rlp.val_at(2)?,
            loop_info: rlp.list_at(3)?,
        })
    }
}

/// Registration of a side-chain coinbase for a main-chain signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SCSetCoinbase {
    /// Side chain genesis hash
    pub hash: H256,
    /// Main-chain signer
    pub signer: Address,
    /// Side-chain coinbase
    pub coinbase: Address,
    /// `false` removes the registration
    pub add: bool,
}

impl Encodable for SCSetCoinbase {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.hash);
        s.append(&self.signer);
        s.append(&self.coinbase);
        s.append(&self.add);
    }
}

impl Decodable for SCSetCoinbase {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 4)?;
        Ok(Self {
            hash: rlp.val_at(0)?,
            signer: rlp.val_at(1)?,
            coinbase: rlp.val_at(2)?,
            add: rlp.val_at(3)?,
        })
    }
}

/// Tokens credited on a side chain on behalf of a rent proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCharging {
    /// Credited account on the side chain
    pub target: Address,
    /// Amount, in ether
    pub volume: u64,
    /// Hash of the rent proposal
    pub hash: H256,
}

impl Encodable for GasCharging {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.target);
        s.append(&self.volume);
        s.append(&self.hash);
    }
}

impl Decodable for GasCharging {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        expect_list(rlp, 3)?;
        Ok(Self {
            target: rlp.val_at(0)?,
            volume: rlp.val_at(1)?,
            hash: rlp.val_at(2)?,
        })
    }
}
