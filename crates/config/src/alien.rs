//! The `[alien]` section: consensus parameters.
//!
//! Every node on a network must load identical values here, or they will
//! disagree on the signer rotation.

use crate::error::{ConfigError, ConfigResult};
use alien_types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Parses a decimal or `0x` hex wei amount.
pub(crate) fn parse_wei(field: &'static str, value: &str) -> ConfigResult<U256> {
    value
        .trim()
        .parse::<U256>()
        .map_err(|_| ConfigError::InvalidAmount {
            field,
            value: value.to_string(),
        })
}

/// How addresses become eligible to receive votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateMode {
    /// Any address that is voted for becomes a candidate
    #[default]
    Open,
    /// Candidates are added and removed only by passed proposals
    Gated,
}

/// Consensus engine parameters.
///
/// Missing keys take their [`Default`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlienConfig {
    /// Seconds between blocks
    pub period: u64,

    /// Blocks after which an unrefreshed vote expires
    pub epoch: u64,

    /// Length of the signer rotation (one loop)
    pub max_signer_count: u64,

    /// Minimum balance in wei for a vote to count (as string for large numbers)
    pub min_voter_balance: String,

    /// Unix time at which the first loop starts
    pub genesis_timestamp: u64,

    /// Signers that vote for themselves with their genesis balance
    pub self_vote_signers: Vec<Address>,

    /// First block of the Trantor fork
    pub trantor_block: Option<u64>,

    /// First block from which failed governance transactions are ignored
    pub terminus_block: Option<u64>,

    /// Run as a side chain following a main chain's rotation
    pub side_chain: bool,

    /// Candidate eligibility mode
    pub candidate_mode: CandidateMode,

    /// Loops between two tally elections
    pub loop_count_recalculate_signers: u64,

    /// Blocks below this height may carry a seal from another account
    pub seal_repair_height: u64,

    /// Individual heights whose seal may mismatch the coinbase
    pub legacy_exempt_heights: Vec<u64>,

    /// Local chain identifier
    pub chain_id: u64,

    /// Main-chain JSON-RPC endpoint (side chain only)
    pub main_chain_rpc_url: Option<String>,

    /// Main-chain identifier used to sign confirmation transactions
    pub main_chain_id: u64,

    /// Gas price in wei for confirmation transactions
    pub main_chain_gas_price: String,
}

impl AlienConfig {
    /// Checks the parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("alien.period", self.period),
            ("alien.epoch", self.epoch),
            ("alien.max_signer_count", self.max_signer_count),
            ("alien.loop_count_recalculate_signers", self.loop_count_recalculate_signers),
            ("alien.chain_id", self.chain_id),
        ];
        if let Some(&(field, _)) = positive.iter().find(|&&(_, value)| value == 0) {
            return Err(ConfigError::Zero(field));
        }
        if self.self_vote_signers.is_empty() {
            return Err(ConfigError::NoSelfVoteSigners);
        }
        if self.side_chain
            && self
                .main_chain_rpc_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MainChainUrlMissing);
        }
        self.min_voter_balance_wei()?;
        self.main_chain_gas_price_wei()?;
        Ok(())
    }

    /// Minimum voter balance in wei.
    pub fn min_voter_balance_wei(&self) -> ConfigResult<U256> {
        parse_wei("min_voter_balance", &self.min_voter_balance)
    }

    /// Main-chain gas price in wei.
    pub fn main_chain_gas_price_wei(&self) -> ConfigResult<U256> {
        parse_wei("main_chain_gas_price", &self.main_chain_gas_price)
    }

    /// Returns true when `number` is at or past the Trantor fork.
    pub fn is_trantor(&self, number: u64) -> bool {
        self.trantor_block.map_or(false, |fork| number >= fork)
    }

    /// Returns true when `number` is the first Trantor block.
    pub fn is_trantor_activation(&self, number: u64) -> bool {
        self.trantor_block == Some(number)
    }

    /// Returns true when `number` is at or past the Terminus fork.
    pub fn is_terminus(&self, number: u64) -> bool {
        self.terminus_block.map_or(false, |fork| number >= fork)
    }

    /// Returns true when block `number` may be sealed by an account other
    /// than its coinbase.
    pub fn tolerates_coinbase_mismatch(&self, number: u64) -> bool {
        number < self.seal_repair_height || self.legacy_exempt_heights.contains(&number)
    }

    /// Returns true in gated candidate mode.
    pub fn candidates_gated(&self) -> bool {
        self.candidate_mode == CandidateMode::Gated
    }
}

impl Default for AlienConfig {
    fn default() -> Self {
        Self {
            period: 3,
            epoch: 201_600,
            max_signer_count: 21,
            // 100 ether
            min_voter_balance: "100000000000000000000".to_string(),
            genesis_timestamp: 0,
            self_vote_signers: Vec::new(),
            trantor_block: None,
            terminus_block: None,
            side_chain: false,
            candidate_mode: CandidateMode::Open,
            loop_count_recalculate_signers: 1,
            seal_repair_height: 0,
            legacy_exempt_heights: Vec::new(),
            chain_id: 1,
            main_chain_rpc_url: None,
            main_chain_id: 1,
            main_chain_gas_price: "1000000000".to_string(),
        }
    }
}
