//! # Alien Storage
//!
//! Where the engine keeps snapshot checkpoints, and where a node keeps the
//! header chain it answers queries from.
//!
//! [`KeyValueStore`] is the only thing the engine sees. [`Database`] backs it
//! with RocksDB; [`MemoryDatabase`] backs it with a map for tests and tools.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod db;
pub mod kv;
pub mod memory;

pub use db::{Column, Database};
pub use kv::KeyValueStore;
pub use memory::MemoryDatabase;

use thiserror::Error;

/// Storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB reported an error
    #[error("database error: {0}")]
    Database(String),

    /// Stored bytes do not decode
    #[error("corrupt record: {0}")]
    Decode(String),

    /// The database was opened without a column family
    #[error("missing column family {0}")]
    MissingColumn(&'static str),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
