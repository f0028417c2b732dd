//! Seal hashing and signer recovery.

use alien_crypto::{recover_address, CryptoError};
use alien_types::{keccak256, Address, Header, H256};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::constants::{EXTRA_SEAL, IN_MEMORY_SIGNATURES};
use crate::error::{AlienError, Result};

/// Signs a 32-byte seal hash on behalf of an account.
pub type SignerFn =
    Arc<dyn Fn(Address, &[u8; 32]) -> std::result::Result<[u8; 65], CryptoError> + Send + Sync>;

/// Hash a sealer signs: the header hash with the seal stripped from `extra`.
pub fn seal_hash(header: &Header) -> Result<H256> {
    if header.extra.len() < EXTRA_SEAL {
        return Err(AlienError::ExtraTooShort);
    }
    let unsealed = &header.extra[..header.extra.len() - EXTRA_SEAL];
    Ok(keccak256(&header.rlp_encode_with_extra(unsealed)))
}

/// Writes `signature` over the seal placeholder.
pub fn write_seal(header: &mut Header, signature: &[u8; 65]) -> Result<()> {
    let len = header.extra.len();
    if len < EXTRA_SEAL {
        return Err(AlienError::ExtraTooShort);
    }
    header.extra[len - EXTRA_SEAL..].copy_from_slice(signature);
    Ok(())
}

/// Recovered signers keyed by header hash.
pub struct SignatureCache {
    inner: Mutex<LruCache<H256, Address>>,
}

impl SignatureCache {
    /// Creates a cache holding up to `capacity` signers.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached signers.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Recovers the sealer of `header`, consulting the cache first.
    pub fn recover(&self, header: &Header) -> Result<Address> {
        let hash = header.hash();
        if let Some(signer) = self.inner.lock().get(&hash) {
            return Ok(*signer);
        }
        let signer = recover_signer(header)?;
        self.inner.lock().put(hash, signer);
        Ok(signer)
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(IN_MEMORY_SIGNATURES)
    }
}

/// Recovers the sealer of `header` without caching.
pub fn recover_signer(header: &Header) -> Result<Address> {
    let len = header.extra.len();
    if len < EXTRA_SEAL {
        return Err(AlienError::MissingSignature);
    }
    let mut signature = [0u8; EXTRA_SEAL];
    signature.copy_from_slice(&header.extra[len - EXTRA_SEAL..]);
    Ok(recover_address(&seal_hash(header)?, &signature)?)
}
