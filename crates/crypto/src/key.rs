//! Signing keys.

use crate::{CryptoError, Result, Signature};
use alien_types::{Address, Transaction, H256};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::fmt;

/// A secp256k1 secret key and the address it controls.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
    address: Address,
}

impl PrivateKey {
    fn wrap(inner: SigningKey) -> Self {
        let point = inner.verifying_key().to_encoded_point(false);
        // skip the 0x04 tag of the uncompressed point
        let address = Address::from_public_key(&point.as_bytes()[1..]);
        Self { inner, address }
    }

    /// A fresh key from the OS RNG.
    pub fn random() -> Self {
        Self::wrap(SigningKey::random(&mut OsRng))
    }

    /// Key from a big-endian scalar. Zero and values past the curve order
    /// are rejected.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        SigningKey::from_bytes(bytes.into())
            .map(Self::wrap)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }

    /// Key from 64 hex digits, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        let scalar: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Self::from_bytes(&scalar)
    }

    /// The big-endian scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes().into()
    }

    /// Address controlled by this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte digest, as used for seals.
    pub fn sign_prehash(&self, hash: &H256) -> Result<Signature> {
        let (sig, recovery_id) = self
            .inner
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recovery_id.to_byte();
        Ok(Signature::from_bytes(&bytes))
    }

    /// Signs a legacy transaction for `chain_id` (EIP-155).
    pub fn sign_transaction(&self, tx: Transaction, chain_id: u64) -> Result<Transaction> {
        let sig = self.sign_prehash(&tx.signing_hash(chain_id))?;
        Ok(tx.with_signature(&sig.to_bytes(), chain_id))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_address() {
        let key =
            PrivateKey::from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
                .unwrap();
        assert_eq!(
            key.address(),
            Address::from_hex("0x2c7536e3605d9c16a7a3d7b1898e529396a65c23").unwrap()
        );
        assert_eq!(PrivateKey::from_bytes(&key.to_bytes()).unwrap().address(), key.address());
    }

    #[test]
    fn test_rejects_bad_scalars() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
        assert!(PrivateKey::from_bytes(&[0xff; 32]).is_err());
        assert!(matches!(
            PrivateKey::from_hex("0x1234"),
            Err(CryptoError::InvalidLength { expected: 32, actual: 2 })
        ));
        assert!(matches!(PrivateKey::from_hex("zz"), Err(CryptoError::Hex(_))));
    }

    #[test]
    fn test_hex_errors_compare() {
        let err = PrivateKey::from_hex("0xz0").unwrap_err();
        assert_eq!(
            err,
            CryptoError::Hex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 })
        );
        assert_ne!(err, CryptoError::InvalidLength { expected: 32, actual: 1 });
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = PrivateKey::from_bytes(&[5u8; 32]).unwrap();
        let shown = format!("{key:?}");
        assert!(shown.contains(&key.address().to_hex()));
        assert!(!shown.contains(&hex::encode(key.to_bytes())));
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(PrivateKey::random().address(), PrivateKey::random().address());
    }
}
