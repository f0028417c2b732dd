//! # Alien Crypto
//!
//! secp256k1 primitives used by the Alien engine: sealing headers, recovering
//! signers from seals, and signing the main-chain confirmation transactions a
//! side-chain sealer submits.
//!
//! Every signature is the 65-byte recoverable form `r || s || v`. Sealers
//! produce `v` in `{0, 1}`; recovery also accepts the legacy `{27, 28}`.
//!
//! ```rust
//! use alien_crypto::{recover_address, PrivateKey};
//! use alien_types::H256;
//!
//! let key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
//! let hash = H256::keccak256(b"header");
//! let seal = key.sign_prehash(&hash).unwrap();
//! assert_eq!(recover_address(&hash, &seal.to_bytes()).unwrap(), key.address());
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod key;
pub mod signature;

pub use key::PrivateKey;
pub use signature::{recover_address, recover_sender, Signature};

/// Signing and recovery failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CryptoError {
    /// Bytes are not a valid secp256k1 scalar
    #[error("bad secret key: {0}")]
    InvalidPrivateKey(String),

    /// Signing failed or `r || s` is not a valid signature
    #[error("bad signature: {0}")]
    InvalidSignature(String),

    /// No public key matches the signature and hash
    #[error("no key recovers: {0}")]
    RecoveryFailed(String),

    /// Input has the wrong width
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected width in bytes
        expected: usize,
        /// Actual width in bytes
        actual: usize,
    },

    /// Input is not hex
    #[error("not hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for this crate
pub type Result<T> = std::result::Result<T, CryptoError>;
