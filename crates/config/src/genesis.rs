//! Genesis balances.
//!
//! Read once, when the engine builds the genesis snapshot: every self-vote
//! signer votes for itself with its balance here.

use crate::alien::parse_wei;
use crate::error::{ConfigError, ConfigResult};
use alien_types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `[[genesis.accounts]]` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Accounts funded at genesis
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

/// One funded account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Account address
    pub address: Address,
    /// Balance in wei, decimal or `0x` hex
    pub balance: String,
}

impl GenesisConfig {
    /// Rejects unparsable balances and repeated addresses.
    pub fn validate(&self) -> ConfigResult<()> {
        self.alloc().map(|_| ())
    }

    /// No accounts, as on a node that only serves stored checkpoints.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Address to balance map.
    pub fn alloc(&self) -> ConfigResult<BTreeMap<Address, U256>> {
        let mut alloc = BTreeMap::new();
        for account in &self.accounts {
            let balance = parse_wei("genesis.accounts.balance", &account.balance)?;
            if alloc.insert(account.address, balance).is_some() {
                return Err(ConfigError::DuplicateAccount(account.address));
            }
        }
        Ok(alloc)
    }

    /// Genesis balance of `address`; zero when unfunded.
    pub fn balance_of(&self, address: &Address) -> ConfigResult<U256> {
        match self.accounts.iter().find(|a| a.address == *address) {
            Some(account) => parse_wei("genesis.accounts.balance", &account.balance),
            None => Ok(U256::ZERO),
        }
    }
}
