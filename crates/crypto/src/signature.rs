//! Recoverable signatures and signer recovery.

use crate::{CryptoError, Result};
use alien_types::{Address, Transaction, H256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use std::fmt;

/// A 65-byte `r || s || v` signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    /// Wraps raw bytes. Nothing is checked until recovery.
    pub const fn from_bytes(bytes: &[u8; 65]) -> Self {
        Self(*bytes)
    }

    /// Copies a 65-byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        <[u8; 65]>::try_from(slice)
            .map(Self)
            .map_err(|_| CryptoError::InvalidLength {
                expected: 65,
                actual: slice.len(),
            })
    }

    /// The raw bytes.
    pub const fn to_bytes(&self) -> [u8; 65] {
        self.0
    }

    /// The recovery bit, folding legacy `27`/`28` down to `0`/`1`.
    pub fn recovery_bit(&self) -> Result<u8> {
        match self.0[64] {
            v @ (0 | 1) => Ok(v),
            v @ (27 | 28) => Ok(v - 27),
            v => Err(CryptoError::InvalidSignature(format!("bad recovery byte {v}"))),
        }
    }

    /// Address whose key produced this signature over `hash`.
    pub fn recover(&self, hash: &H256) -> Result<Address> {
        let sig = EcdsaSignature::from_slice(&self.0[..64])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let recovery_id = RecoveryId::from_byte(self.recovery_bit()?)
            .ok_or_else(|| CryptoError::InvalidSignature("bad recovery id".into()))?;
        let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &sig, recovery_id)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        let point = key.to_encoded_point(false);
        Ok(Address::from_public_key(&point.as_bytes()[1..]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.0))
    }
}

/// Recovers the signer of a header seal or any other prehashed message.
pub fn recover_address(hash: &H256, signature: &[u8; 65]) -> Result<Address> {
    Signature::from_bytes(signature).recover(hash)
}

/// Recovers the sender of a signed legacy transaction.
pub fn recover_sender(tx: &Transaction) -> Result<Address> {
    let (prehash, sig) = tx
        .recovery_parts()
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    recover_address(&prehash, &sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrivateKey;

    #[test]
    fn test_legacy_recovery_byte() {
        let key = PrivateKey::from_bytes(&[3u8; 32]).unwrap();
        let hash = H256::keccak256(b"seal");
        let mut bytes = key.sign_prehash(&hash).unwrap().to_bytes();
        let bit = bytes[64];
        assert!(bit <= 1);

        bytes[64] = bit + 27;
        assert_eq!(recover_address(&hash, &bytes).unwrap(), key.address());

        bytes[64] = 4;
        assert!(matches!(
            recover_address(&hash, &bytes),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_from_slice_width() {
        assert!(Signature::from_slice(&[0u8; 64]).is_err());
        assert!(Signature::from_slice(&[0u8; 65]).is_ok());
    }

    #[test]
    fn test_zero_signature_does_not_recover() {
        assert!(recover_address(&H256::keccak256(b"x"), &[0u8; 65]).is_err());
    }
}
