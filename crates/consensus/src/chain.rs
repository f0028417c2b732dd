//! The engine's view of the host chain and its account state.
//!
//! The engine never executes transactions. It reads headers through
//! [`ChainReader`] and moves balances through [`StateDb`] during finalize.

use alien_storage::Database;
use alien_types::{keccak256, Address, Header, H256, U256};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Read access to the header chain.
pub trait ChainReader: Send + Sync {
    /// Header with `hash` at `number`.
    fn header(&self, hash: &H256, number: u64) -> Option<Header>;

    /// Canonical header at `number`.
    fn header_by_number(&self, number: u64) -> Option<Header>;

    /// Header with `hash`.
    fn header_by_hash(&self, hash: &H256) -> Option<Header>;

    /// Head of the canonical chain.
    fn current_header(&self) -> Option<Header>;

    /// The genesis header.
    fn genesis(&self) -> Option<Header> {
        self.header_by_number(0)
    }
}

/// Balance access to the post-execution state of the block being finalized.
pub trait StateDb: Send {
    /// Balance of `address`, zero if unknown.
    fn balance(&self, address: &Address) -> U256;

    /// Credits `amount` to `address`.
    fn add_balance(&mut self, address: &Address, amount: U256);

    /// Debits `amount` from `address`, stopping at zero.
    fn sub_balance(&mut self, address: &Address, amount: U256);

    /// State root after the engine's changes.
    fn root(&self) -> H256;
}

#[derive(Debug, Default)]
struct MemoryChainInner {
    headers: HashMap<H256, Header>,
    canonical: BTreeMap<u64, H256>,
}

/// A [`ChainReader`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryChain {
    inner: RwLock<MemoryChainInner>,
}

impl MemoryChain {
    /// Creates a chain holding only `genesis`.
    pub fn new(genesis: Header) -> Self {
        let chain = Self::default();
        chain.insert(genesis);
        chain
    }

    /// Stores `header` and makes it canonical at its height. Canonical
    /// entries above it are dropped.
    pub fn insert(&self, header: Header) {
        let hash = header.hash();
        let number = header.number;
        let mut inner = self.inner.write();
        let stale: Vec<u64> = inner.canonical.range(number + 1..).map(|(n, _)| *n).collect();
        for n in stale {
            inner.canonical.remove(&n);
        }
        inner.canonical.insert(number, hash);
        inner.headers.insert(hash, header);
    }

    /// Number of the canonical head.
    pub fn head_number(&self) -> Option<u64> {
        self.inner.read().canonical.keys().next_back().copied()
    }
}

impl ChainReader for MemoryChain {
    fn header(&self, hash: &H256, number: u64) -> Option<Header> {
        self.inner
            .read()
            .headers
            .get(hash)
            .filter(|h| h.number == number)
            .cloned()
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        let inner = self.inner.read();
        let hash = inner.canonical.get(&number)?;
        inner.headers.get(hash).cloned()
    }

    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.inner.read().headers.get(hash).cloned()
    }

    fn current_header(&self) -> Option<Header> {
        let inner = self.inner.read();
        let (_, hash) = inner.canonical.iter().next_back()?;
        inner.headers.get(hash).cloned()
    }
}

impl ChainReader for Database {
    fn header(&self, hash: &H256, number: u64) -> Option<Header> {
        self.header_by_hash(hash).filter(|h| h.number == number)
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        self.get_header_by_number(number)
            .unwrap_or_else(|e| {
                warn!(number, error = %e, "Failed to read canonical header");
                None
            })
    }

    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.get_header(hash).unwrap_or_else(|e| {
            warn!(hash = %hash, error = %e, "Failed to read header");
            None
        })
    }

    fn current_header(&self) -> Option<Header> {
        self.head_header().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read chain head");
            None
        })
    }
}

/// A [`StateDb`] over an in-memory balance map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    balances: BTreeMap<Address, U256>,
}

impl MemoryState {
    /// Creates a state with the given balances.
    pub fn new(balances: BTreeMap<Address, U256>) -> Self {
        Self { balances }
    }

    /// Overwrites the balance of `address`.
    pub fn set_balance(&mut self, address: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&address);
        } else {
            self.balances.insert(address, amount);
        }
    }

    /// All non-zero balances.
    pub fn balances(&self) -> &BTreeMap<Address, U256> {
        &self.balances
    }
}

impl StateDb for MemoryState {
    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn add_balance(&mut self, address: &Address, amount: U256) {
        let balance = self.balance(address).saturating_add(amount);
        self.set_balance(*address, balance);
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) {
        let balance = self.balance(address).saturating_sub(amount);
        self.set_balance(*address, balance);
    }

    fn root(&self) -> H256 {
        let mut buf = Vec::with_capacity(self.balances.len() * 52);
        for (address, balance) in &self.balances {
            buf.extend_from_slice(address.as_bytes());
            buf.extend_from_slice(&balance.to_be_bytes::<32>());
        }
        keccak256(&buf)
    }
}
