//! Fixed-width byte strings: [`H256`] hashes, [`Address`]es and the header
//! [`Bloom`].
//!
//! Both types order by raw bytes. The signer election depends on that order
//! to break ties between equal stakes and equal history hashes, so it must
//! never change. Hex forms are lowercase with a `0x` prefix; the same form
//! is used for serde, `Display` and the payloads of governance transactions.

use crate::{Error, Result};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

macro_rules! fixed_bytes {
    ($(#[$attr:meta])* $name:ident, $len:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            /// All zero bytes.
            pub const ZERO: Self = Self([0u8; $len]);

            /// Wraps `bytes`.
            #[inline]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Copies `slice`, which must be exactly the right width.
            pub fn from_slice(slice: &[u8]) -> Result<Self> {
                <[u8; $len]>::try_from(slice)
                    .map(Self)
                    .map_err(|_| Error::InvalidLength {
                        expected: $len,
                        actual: slice.len(),
                    })
            }

            /// Parses hex, with or without `0x`.
            pub fn from_hex(s: &str) -> Result<Self> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                Self::from_slice(&hex::decode(digits)?)
            }

            /// Lowercase hex with `0x`.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// The raw bytes.
            #[inline]
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// The raw bytes as an array.
            #[inline]
            pub const fn as_fixed_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// True when every byte is zero.
            #[inline]
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(de::Error::custom)
            }
        }

        impl Encodable for $name {
            fn rlp_append(&self, s: &mut RlpStream) {
                s.encoder().encode_value(&self.0);
            }
        }

        impl Decodable for $name {
            fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
                rlp.decoder().decode_value(|bytes| {
                    <[u8; $len]>::try_from(bytes)
                        .map(Self)
                        .map_err(|_| DecoderError::RlpInvalidLength)
                })
            }
        }
    };
}

fixed_bytes!(
    /// A Keccak-256 digest: block, seal, transaction and proposal hashes.
    H256,
    32
);

fixed_bytes!(
    /// A 20-byte account address: signers, voters, candidates and
    /// side-chain coinbases.
    Address,
    20
);

fixed_bytes!(
    /// The 2048-bit log bloom of a header. The engine never reads it.
    Bloom,
    256
);

impl H256 {
    /// Keccak-256 of `data`.
    pub fn keccak256(data: &[u8]) -> Self {
        Self(Keccak256::digest(data).into())
    }
}

impl Address {
    /// Address owning an uncompressed secp256k1 key (64 bytes, no `0x04` tag):
    /// the last 20 bytes of its Keccak-256.
    pub fn from_public_key(pubkey: &[u8]) -> Self {
        let digest = Keccak256::digest(pubkey);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }
}

/// Keccak-256 of `data`.
#[inline]
pub fn keccak256(data: &[u8]) -> H256 {
    H256::keccak256(data)
}
