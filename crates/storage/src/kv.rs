//! The key/value seam between the engine and the host database.

use crate::Result;
use std::sync::Arc;

/// A byte-addressed store.
///
/// Writes are idempotent: the engine only ever writes the same value under a
/// given key, so implementations need no transactions.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes `key` if present.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Returns true if `key` is present.
    fn contains(&self, key: &[u8]) -> Result<bool> {
        self.get(key).map(|v| v.is_some())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
}
