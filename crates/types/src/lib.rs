//! # Alien Types
//!
//! The chain primitives the Alien engine reads and writes.
//!
//! - [`Address`], [`H256`], [`Bloom`]: fixed-width bytes, ordered bytewise, with
//!   hex, serde and RLP forms
//! - [`Header`], [`Block`]: Ethereum-layout headers whose extra-data carries
//!   the consensus payload
//! - [`Transaction`]: legacy EIP-155 transactions, the carrier of governance
//!   commands
//! - [`Receipt`]: the execution facts the engine checks
//!
//! ```rust
//! use alien_types::{Address, Header, H256};
//!
//! let header = Header {
//!     number: 1,
//!     coinbase: Address::new([0x11; 20]),
//!     ..Default::default()
//! };
//! assert_ne!(header.hash(), H256::ZERO);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod block;
pub mod fixed;
mod hex_serde;
pub mod transaction;
pub mod uint;

pub use alloy_primitives::U256;
pub use block::{Block, Header, EMPTY_UNCLE_HASH};
pub use fixed::{keccak256, Address, Bloom, H256};
pub use transaction::{Receipt, ReceiptStatus, Transaction};

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Failures parsing or decoding primitives
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Text is not hex
    #[error("not hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Bytes of the wrong width for a fixed-size value
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required width
        expected: usize,
        /// Width found
        actual: usize,
    },

    /// A transaction cannot yield a sender
    #[error("bad transaction: {0}")]
    InvalidTransaction(String),

    /// Malformed RLP
    #[error("bad rlp: {0}")]
    RlpDecode(#[from] rlp::DecoderError),
}
