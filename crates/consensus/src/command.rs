//! Governance commands embedded in transaction payloads.
//!
//! A payload starting with `ufo:1:` is a colon-separated command:
//!
//! ```text
//! ufo:1:event:vote
//! ufo:1:event:confirm:<N>
//! ufo:1:event:proposal:<key>:<value>:...
//! ufo:1:event:declare:hash:<H>:decision:<yes|no>
//! ufo:1:sc:confirm:<sc-hash>:<sc-number>:<loop-info>...
//! ufo:1:sc:setcb:<sc-hash>
//! ```
//!
//! [`parse`] only checks syntax and value ranges. Whether a command has an
//! effect depends on the chain and is decided by the processor.

use alien_types::{Address, H256};

use crate::constants::{
    DEFAULT_SC_RENT_LENGTH, MAX_PROPOSAL_DEPOSIT_ETHER, MAX_VALIDATION_LOOP_CNT,
    MIN_SC_RENT_FEE, MIN_VALIDATION_LOOP_CNT, SC_MAX_COUNT_PER_PERIOD,
};
use crate::types::ProposalType;

/// Prefix every governance payload starts with.
pub const COMMAND_PREFIX: &str = "ufo:1:";

/// Why a payload carries no governance effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Payload does not start with `ufo:1:`
    #[error("not a governance payload")]
    NotGovernance,

    /// Payload is not ASCII text
    #[error("payload is not valid text")]
    NotText,

    /// Category and action pair is not known
    #[error("unknown command {category}:{action}")]
    UnknownCommand {
        /// Category tag
        category: String,
        /// Action tag
        action: String,
    },

    /// A required field is absent
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A numeric field does not parse
    #[error("invalid number for {field}: {value}")]
    InvalidNumber {
        /// Field name
        field: &'static str,
        /// Raw value
        value: String,
    },

    /// A numeric field parses but is out of range
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Parsed value
        value: u64,
    },

    /// An address field does not parse
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A hash field does not parse
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Declare decision is neither `yes` nor `no`
    #[error("invalid decision: {0}")]
    InvalidDecision(String),

    /// Proposal option key without a value
    #[error("option {0} has no value")]
    DanglingKey(String),

    /// Proposal type is not known
    #[error("unknown proposal type {0}")]
    UnknownProposalType(u64),
}

/// Proposal parameters as written by the proposer.
///
/// Fields left unset fall back to chain defaults in the processor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProposalOptions {
    /// `proposal_type`
    pub proposal_type: Option<ProposalType>,
    /// `vlcnt`
    pub validation_loop_cnt: Option<u64>,
    /// `implement_number`
    pub implement_number: Option<u64>,
    /// `candidate`
    pub candidate: Option<Address>,
    /// `mrpt`
    pub miner_reward_per_thousand: Option<u64>,
    /// `schash`
    pub sc_hash: Option<H256>,
    /// `sccount`
    pub sc_block_count_per_period: Option<u64>,
    /// `screward`
    pub sc_block_reward_per_period: Option<u64>,
    /// `mvb`, in ether
    pub min_voter_balance: Option<u64>,
    /// `mpd`, in ether
    pub proposal_deposit: Option<u64>,
    /// `scrt`
    pub sc_rent_target: Option<Address>,
    /// `scrf`, in ether
    pub sc_rent_fee: Option<u64>,
    /// `scrr`, in ether
    pub sc_rent_rate: Option<u64>,
    /// `scrl`, in blocks
    pub sc_rent_length: Option<u64>,
}

/// A parsed governance command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceCommand {
    /// Vote for the transaction recipient
    Vote,
    /// Confirm block `number`
    Confirm {
        /// Confirmed block
        number: u64,
    },
    /// Open a proposal
    Proposal(ProposalOptions),
    /// Decide on a proposal
    Declare {
        /// Proposal hash
        hash: H256,
        /// `true` for yes
        decision: bool,
    },
    /// Report a side-chain loop
    SideChainConfirm {
        /// Side chain genesis hash
        hash: H256,
        /// Side-chain loop-end number
        number: u64,
        /// Coinbases and charging receipts, as written
        loop_info: Vec<String>,
    },
    /// Register the transaction recipient as side-chain coinbase
    SideChainSetCoinbase {
        /// Side chain genesis hash
        hash: H256,
    },
}

/// Returns true if `data` looks like a governance payload.
pub fn is_governance(data: &[u8]) -> bool {
    data.starts_with(COMMAND_PREFIX.as_bytes())
}

/// Parses a transaction payload.
pub fn parse(data: &[u8]) -> Result<GovernanceCommand, ParseError> {
    if !is_governance(data) {
        return Err(ParseError::NotGovernance);
    }
    let text = std::str::from_utf8(data).map_err(|_| ParseError::NotText)?;
    let fields: Vec<&str> = text.split(':').collect();
    let category = fields.get(2).copied().unwrap_or_default();
    let action = fields.get(3).copied().unwrap_or_default();
    let args = fields.get(4..).unwrap_or_default();

    match (category, action) {
        ("event", "vote") => Ok(GovernanceCommand::Vote),
        ("event", "confirm") => {
            let raw = args.first().ok_or(ParseError::MissingField("number"))?;
            Ok(GovernanceCommand::Confirm {
                number: parse_u64("number", raw)?,
            })
        }
        ("event", "proposal") => parse_proposal(args).map(GovernanceCommand::Proposal),
        ("event", "declare") => parse_declare(args),
        ("sc", "confirm") => {
            let hash = parse_hash(args.first().ok_or(ParseError::MissingField("hash"))?)?;
            let number = parse_u64(
                "number",
                args.get(1).ok_or(ParseError::MissingField("number"))?,
            )?;
            let loop_info = args[2..].iter().map(|s| s.to_string()).collect();
            Ok(GovernanceCommand::SideChainConfirm {
                hash,
                number,
                loop_info,
            })
        }
        ("sc", "setcb") => {
            let hash = parse_hash(args.first().ok_or(ParseError::MissingField("hash"))?)?;
            Ok(GovernanceCommand::SideChainSetCoinbase { hash })
        }
        _ => Err(ParseError::UnknownCommand {
            category: category.to_string(),
            action: action.to_string(),
        }),
    }
}

fn parse_proposal(args: &[&str]) -> Result<ProposalOptions, ParseError> {
    let mut options = ProposalOptions::default();
    for pair in args.chunks(2) {
        let key = pair[0];
        let value = match pair.get(1) {
            Some(value) => *value,
            None => return Err(ParseError::DanglingKey(key.to_string())),
        };
        match key {
            "vlcnt" => {
                options.validation_loop_cnt = Some(parse_in_range(
                    "vlcnt",
                    value,
                    MIN_VALIDATION_LOOP_CNT,
                    MAX_VALIDATION_LOOP_CNT,
                )?)
            }
            "implement_number" => {
                options.implement_number = Some(parse_u64("implement_number", value)?)
            }
            "proposal_type" => {
                let raw = parse_u64("proposal_type", value)?;
                options.proposal_type = Some(
                    ProposalType::from_u64(raw).ok_or(ParseError::UnknownProposalType(raw))?,
                );
            }
            "candidate" => options.candidate = Some(parse_address(value)?),
            "mrpt" => {
                options.miner_reward_per_thousand =
                    Some(parse_in_range("mrpt", value, 0, 1000)?)
            }
            "schash" => options.sc_hash = Some(parse_hash(value)?),
            "sccount" => {
                options.sc_block_count_per_period =
                    Some(parse_in_range("sccount", value, 0, SC_MAX_COUNT_PER_PERIOD)?)
            }
            "screward" => {
                options.sc_block_reward_per_period =
                    Some(parse_in_range("screward", value, 0, 1000)?)
            }
            "mvb" => options.min_voter_balance = Some(parse_in_range("mvb", value, 1, u64::MAX)?),
            "mpd" => {
                options.proposal_deposit =
                    Some(parse_in_range("mpd", value, 1, MAX_PROPOSAL_DEPOSIT_ETHER)?)
            }
            "scrt" => options.sc_rent_target = Some(parse_address(value)?),
            "scrf" => {
                options.sc_rent_fee = Some(parse_in_range("scrf", value, MIN_SC_RENT_FEE, u64::MAX)?)
            }
            "scrr" => options.sc_rent_rate = Some(parse_in_range("scrr", value, 1, u64::MAX)?),
            "scrl" => {
                options.sc_rent_length =
                    Some(parse_in_range("scrl", value, DEFAULT_SC_RENT_LENGTH, u64::MAX)?)
            }
            _ => {}
        }
    }
    Ok(options)
}

fn parse_declare(args: &[&str]) -> Result<GovernanceCommand, ParseError> {
    let mut hash = None;
    let mut decision = None;
    for pair in args.chunks(2) {
        let value = match pair.get(1) {
            Some(value) => *value,
            None => return Err(ParseError::DanglingKey(pair[0].to_string())),
        };
        match pair[0] {
            "hash" => hash = Some(parse_hash(value)?),
            "decision" => {
                decision = Some(match value {
                    "yes" => true,
                    "no" => false,
                    other => return Err(ParseError::InvalidDecision(other.to_string())),
                })
            }
            _ => {}
        }
    }
    Ok(GovernanceCommand::Declare {
        hash: hash.ok_or(ParseError::MissingField("hash"))?,
        decision: decision.ok_or(ParseError::MissingField("decision"))?,
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_in_range(field: &'static str, value: &str, min: u64, max: u64) -> Result<u64, ParseError> {
    let parsed = parse_u64(field, value)?;
    if parsed < min || parsed > max {
        return Err(ParseError::OutOfRange {
            field,
            value: parsed,
        });
    }
    Ok(parsed)
}

/// Parses a `0x`-prefixed 20-byte address.
pub fn parse_address(value: &str) -> Result<Address, ParseError> {
    if value.len() != 42 || !value.starts_with("0x") {
        return Err(ParseError::InvalidAddress(value.to_string()));
    }
    Address::from_hex(value).map_err(|_| ParseError::InvalidAddress(value.to_string()))
}

/// Parses a `0x`-prefixed 32-byte hash.
pub fn parse_hash(value: &str) -> Result<H256, ParseError> {
    if value.len() != 66 || !value.starts_with("0x") {
        return Err(ParseError::InvalidHash(value.to_string()));
    }
    H256::from_hex(value).map_err(|_| ParseError::InvalidHash(value.to_string()))
}
