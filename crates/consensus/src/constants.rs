//! Protocol constants and the emission schedule.

use alien_types::U256;
use std::time::Duration;

/// Fixed number of vanity bytes at the front of `extra`.
pub const EXTRA_VANITY: usize = 32;
/// Fixed number of seal bytes at the end of `extra`.
pub const EXTRA_SEAL: usize = 65;

/// Recent snapshots kept in memory.
pub const IN_MEMORY_SNAPSHOTS: usize = 128;
/// Recovered signers kept in memory.
pub const IN_MEMORY_SIGNATURES: usize = 4096;
/// Snapshots at multiples of this number are persisted.
pub const CHECKPOINT_INTERVAL: u64 = 360;

/// Seconds in a (non-leap) year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;
/// Share of the block reward kept by the sealer, per thousand.
pub const MINER_REWARD_PER_THOUSAND: u64 = 618;

// Credit ledger
/// Credit of a signer that never missed a slot.
pub const DEFAULT_FULL_CREDIT: u64 = 28800;
/// Debt added for each missed slot.
pub const MISSING_PUBLISH_CREDIT: u64 = 100;
/// Debt removed from the sealer of each block.
pub const SIGN_REWARD_CREDIT: u64 = 10;
/// Debt removed from every punished signer on each block.
pub const AUTO_REWARD_CREDIT: u64 = 1;
/// Floor of the election weight of a punished candidate.
pub const MIN_CAL_SIGNER_QUEUE_CREDIT: u64 = 10000;
/// Ceiling of the punishment ledger.
pub const MAX_PUNISHMENT: u64 = 10 * DEFAULT_FULL_CREDIT;

// Proposals
/// Lower bound of `vlcnt`.
pub const MIN_VALIDATION_LOOP_CNT: u64 = 12;
/// `vlcnt` when the proposal omits it.
pub const DEFAULT_VALIDATION_LOOP_CNT: u64 = 144;
/// Upper bound of `vlcnt`.
pub const MAX_VALIDATION_LOOP_CNT: u64 = 28800;
/// Loops between resolution and the deposit refund.
pub const PROPOSAL_REFUND_DELAY_LOOP_COUNT: u64 = 2;
/// Initial proposal deposit, in ether.
pub const PROPOSAL_DEPOSIT_ETHER: u64 = 10_000;
/// Upper bound of `mpd`, in ether.
pub const MAX_PROPOSAL_DEPOSIT_ETHER: u64 = 100_000;
/// Above this many voters, under-balance votes expire too.
pub const MAX_UNCHECK_BALANCE_VOTE_COUNT: usize = 10_000;

// Official election slots
/// Signer count that enables the tiered election.
pub const OFFICIAL_MAX_SIGNER_COUNT: u64 = 21;
/// First-level candidates, all elected.
pub const OFFICIAL_FIRST_LEVEL_COUNT: usize = 10;
/// End of the second level.
pub const OFFICIAL_SECOND_LEVEL_COUNT: usize = 20;
/// End of the third level; the tiered path needs more candidates than this.
pub const OFFICIAL_THIRD_LEVEL_COUNT: usize = 30;
/// End of the last level.
pub const OFFICIAL_MAX_VALID_COUNT: usize = 50;
/// Elected from the second level.
pub const OFFICIAL_SECOND_LEVEL_SLOTS: usize = 6;
/// Elected from the third level.
pub const OFFICIAL_THIRD_LEVEL_SLOTS: usize = 4;
/// Elected from the last level.
pub const OFFICIAL_LAST_LEVEL_SLOTS: usize = 1;

// Side chains
/// Side-chain loops a sealer waits before confirming on the main chain.
pub const SC_UNCONFIRM_LOOP: u64 = 3;
/// Loops a confirmed charging notice stays in the snapshot.
pub const SC_NOTICE_CLEAR_DELAY_LOOP_COUNT: u64 = 4;
/// Default and minimum `scrl`.
pub const DEFAULT_SC_RENT_LENGTH: u64 = 259_200;
/// Minimum `scrf`, in ether.
pub const MIN_SC_RENT_FEE: u64 = 100;
/// Gas limit of a side-chain confirmation transaction.
pub const SC_CONFIRM_GAS_LIMIT: u64 = 200_000;
/// Upper bound of `sccount`.
pub const SC_MAX_COUNT_PER_PERIOD: u64 = 6;
/// Confirmation records kept per side chain, in multiples of the signer count.
pub const SC_MAX_CONFIRMED_RECORD_LOOPS: u64 = 50;
/// Loops a side-chain score table stays payable.
pub const SC_REWARD_EXPIRED_LOOP_COUNT: u64 = 4;

/// Deadline of every main-chain call made by a side chain.
pub const MAIN_CHAIN_TIMEOUT: Duration = Duration::from_millis(300);

/// Prefix of the snapshot checkpoint keys.
pub const SNAPSHOT_KEY_PREFIX: &[u8] = b"alien-";

/// `n` ether in wei.
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

/// Total emission over the life of the chain.
pub fn total_reward() -> U256 {
    ether(250_000_000)
}

/// Initial minimum voter balance.
pub fn min_voter_balance() -> U256 {
    ether(100)
}

/// Initial proposal deposit.
pub fn proposal_deposit() -> U256 {
    ether(PROPOSAL_DEPOSIT_ETHER)
}

/// Blocks sealed per year at `period` seconds per block.
pub fn blocks_per_year(period: u64) -> u64 {
    (SECONDS_PER_YEAR / period.max(1)).max(1)
}

/// The year-zero block reward.
pub fn signer_block_reward(period: u64) -> U256 {
    total_reward() / U256::from(2 * blocks_per_year(period))
}

/// The block reward at `number`, halved once per year.
pub fn block_reward(number: u64, period: u64) -> U256 {
    let years = number / blocks_per_year(period);
    if years >= 256 {
        return U256::ZERO;
    }
    signer_block_reward(period) >> (years as usize)
}
