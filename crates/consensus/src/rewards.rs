//! Block reward distribution.
//!
//! The block reward is split between the sealer and the voters backing it.
//! Registered side chains take a share of the sealer's part plus any active
//! rent, paid to side-chain coinbases by score. Gas refunds of consensus
//! transactions come out of the sealer's part.

use alien_types::{Address, Header, Receipt, Transaction, U256};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::chain::StateDb;
use crate::constants::{block_reward, ether};
use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::types::GasCharging;

/// Amounts credited by [`accumulate_rewards`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardSummary {
    /// Credited to the sealer
    pub miner: U256,
    /// Credited to voters of the sealer
    pub voters: BTreeMap<Address, U256>,
    /// Credited to side-chain coinbases
    pub side_chains: BTreeMap<Address, U256>,
}

/// Side-chain payouts at `number` and the amount taken from the sealer.
pub fn side_chain_rewards(
    snap: &Snapshot,
    number: u64,
    miner_reward: U256,
) -> (BTreeMap<Address, U256>, U256) {
    let mut rewards: BTreeMap<Address, U256> = BTreeMap::new();
    let mut deducted = U256::ZERO;
    let Some(settled_at) = number.checked_sub(1) else {
        return (rewards, deducted);
    };
    for record in snap.sc_records.values() {
        let Some(scores) = record.scores.get(&settled_at) else {
            continue;
        };
        let share = miner_reward * U256::from(record.reward_per_period) / U256::from(1000u64);
        let pool = share + record.active_rent(number);
        deducted += share;
        for (coinbase, score) in scores {
            *rewards.entry(*coinbase).or_default() += pool * U256::from(*score) / U256::from(100u64);
        }
    }
    (rewards, deducted)
}

/// Credits the rewards of main-chain block `header`, computed against the
/// parent snapshot.
///
/// `refund_gas` holds the gas each sender is refunded for its consensus
/// transactions in this block.
pub fn accumulate_rewards(
    snap: &Snapshot,
    state: &mut dyn StateDb,
    header: &Header,
    refund_gas: &BTreeMap<Address, U256>,
) -> Result<RewardSummary> {
    let reward = block_reward(header.number, snap.config().period);
    let miner_reward = reward * U256::from(snap.miner_reward) / U256::from(1000u64);
    let voter_reward = reward.saturating_sub(miner_reward);

    let voters = snap.vote_rewards(&header.coinbase, header.number, voter_reward)?;
    for (voter, amount) in &voters {
        state.add_balance(voter, *amount);
    }

    let (side_chains, deducted) = side_chain_rewards(snap, header.number, miner_reward);
    for (coinbase, amount) in &side_chains {
        state.add_balance(coinbase, *amount);
    }

    let mut miner = miner_reward.saturating_sub(deducted);
    for (sender, gas) in refund_gas {
        miner = miner.saturating_sub(*gas);
        state.add_balance(sender, *gas);
    }
    state.add_balance(&header.coinbase, miner);

    if let Some(refunds) = snap.proposal_refund.get(&header.number) {
        for (proposer, amount) in refunds {
            trace!(proposer = %proposer, amount = %amount, "Refunding proposal deposit");
            state.add_balance(proposer, *amount);
        }
    }

    debug!(
        number = header.number,
        miner = %miner,
        voters = voters.len(),
        side_chains = side_chains.len(),
        "Accumulated block rewards"
    );
    Ok(RewardSummary {
        miner,
        voters,
        side_chains,
    })
}

/// Gas a side-chain sealer owes for the transactions of its block.
pub fn side_chain_gas(txs: &[Transaction], receipts: &[Receipt]) -> U256 {
    txs.iter()
        .filter_map(|tx| {
            let hash = tx.hash();
            receipts
                .iter()
                .find(|r| r.tx_hash == hash)
                .map(|r| U256::from(r.gas_used) * tx.gas_price)
        })
        .fold(U256::ZERO, |acc, gas| acc + gas)
}

/// Credits rented gas to its targets on a side chain.
pub fn credit_chargings(state: &mut dyn StateDb, chargings: &[GasCharging]) {
    for charging in chargings {
        state.add_balance(&charging.target, ether(charging.volume));
    }
}
