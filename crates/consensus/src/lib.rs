//! # Alien Consensus
//!
//! Delegated proof-of-stake consensus engine with on-chain governance.
//!
//! Account holders vote for candidates by sending governance transactions.
//! Every few loops the highest-staked candidates are elected into a signer
//! rotation, and each signer seals blocks in its time slot. Votes, block
//! confirmations, proposals and side-chain reports travel in the header
//! extra, so any node can rebuild the governance state from headers alone.
//!
//! ## Block Extra Layout
//!
//! ```text
//! ┌────────────┬──────────────────────────────┬─────────────┐
//! │ vanity (32)│ RLP(HeaderExtra)             │ seal (65)   │
//! └────────────┴──────────────────────────────┴─────────────┘
//! ```
//!
//! ## Loop Timeline
//!
//! ```text
//! loop_start                                  loop_start + period * n
//! │ slot 0 │ slot 1 │ ...  │ slot n-1 │ next loop ...
//! │ q[0]   │ q[1]   │      │ q[n-1]   │ (new queue at block % n == 0)
//! ```
//!
//! A signer that misses its slot accrues punishment, which lowers the weight
//! of its tally in the next election.
//!
//! ## Example
//!
//! ```rust,ignore
//! use alien_consensus::{Alien, MemoryChain};
//!
//! let engine = Arc::new(Alien::new(config, Some(alloc), db)?);
//! engine.authorize(signer, sign_fn);
//!
//! engine.prepare(&chain, &mut header).await?;
//! let block = engine.finalize(&chain, header, &mut state, txs, receipts).await?;
//! let sealed = engine.seal(&chain, block, stop).await?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod api;
pub mod chain;
pub mod command;
pub mod constants;
pub mod cross_chain;
pub mod engine;
pub mod error;
pub mod extra;
pub mod processor;
pub mod rewards;
pub mod seal;
pub mod side_chain;
pub mod signer_queue;
pub mod snapshot;
pub mod types;

// Re-export main types at crate root for convenience
pub use api::SnapshotApi;
pub use chain::{ChainReader, MemoryChain, MemoryState, StateDb};
pub use command::{GovernanceCommand, ParseError, ProposalOptions};
pub use cross_chain::{MainChainClient, MainChainSnapshot, MainChainView};
pub use engine::Alien;
pub use error::{AlienError, Result};
pub use extra::HeaderExtra;
pub use processor::{BlockEvents, Processor};
pub use rewards::RewardSummary;
pub use seal::{recover_signer, seal_hash, write_seal, SignatureCache, SignerFn};
pub use side_chain::{NoticeRecord, RentReward, SideChainRecord};
pub use snapshot::{in_turn_signer, signer_missing_trantor, Snapshot};
pub use types::{
    Confirmation, Declare, GasCharging, Proposal, ProposalType, SCConfirmation, SCSetCoinbase,
    Vote,
};
