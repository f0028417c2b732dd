//! RocksDB-backed node database.
//!
//! Snapshot checkpoints live in [`Column::Consensus`] and are reached through
//! the [`KeyValueStore`] impl. The other columns hold the header chain a node
//! serves queries from.

use alien_types::{Header, H256};
use rocksdb::{BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, Options, DB};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{KeyValueStore, Result, StorageError};

/// Block cache used by [`Database::open_default`], in MiB.
pub const DEFAULT_CACHE_MB: u64 = 64;

const HEAD_KEY: &[u8] = b"head";

/// Column families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Snapshot checkpoints, keyed by the engine
    Consensus,
    /// RLP headers by hash
    Headers,
    /// Big-endian block number to canonical hash
    Canonical,
    /// Chain head marker
    Meta,
}

impl Column {
    /// Every column, in creation order.
    pub const ALL: [Column; 4] = [Column::Consensus, Column::Headers, Column::Canonical, Column::Meta];

    /// On-disk name.
    pub const fn name(self) -> &'static str {
        match self {
            Column::Consensus => "consensus",
            Column::Headers => "headers",
            Column::Canonical => "canonical",
            Column::Meta => "meta",
        }
    }
}

fn db_err(e: rocksdb::Error) -> StorageError {
    StorageError::Database(e.into_string())
}

/// A RocksDB instance with one column family per [`Column`].
pub struct Database {
    db: DB,
    path: PathBuf,
}

impl Database {
    /// Opens or creates the database at `path` with an LRU block cache of
    /// `cache_mb` MiB shared by all columns.
    pub fn open(path: impl AsRef<Path>, cache_mb: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = Cache::new_lru_cache((cache_mb as usize) << 20);
        let column_options = || {
            let mut table = BlockBasedOptions::default();
            table.set_block_cache(&cache);
            let mut opts = Options::default();
            opts.set_block_based_table_factory(&table);
            opts.set_compression_type(DBCompressionType::Lz4);
            opts
        };

        let mut opts = column_options();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let columns = Column::ALL
            .iter()
            .map(|c| ColumnFamilyDescriptor::new(c.name(), column_options()));
        let db = DB::open_cf_descriptors(&opts, &path, columns).map_err(db_err)?;

        info!(path = %path.display(), cache_mb, "Opened database");
        Ok(Self { db, path })
    }

    /// Opens with [`DEFAULT_CACHE_MB`].
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, DEFAULT_CACHE_MB)
    }

    /// Directory the database lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&self, column: Column) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(column.name())
            .ok_or(StorageError::MissingColumn(column.name()))
    }

    /// Reads `key` from `column`.
    pub fn read(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.get_cf(self.handle(column)?, key).map_err(db_err)
    }

    /// Writes `key` into `column`.
    pub fn write(&self, column: Column, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put_cf(self.handle(column)?, key, value).map_err(db_err)
    }

    /// Removes `key` from `column`.
    pub fn remove(&self, column: Column, key: &[u8]) -> Result<()> {
        self.db.delete_cf(self.handle(column)?, key).map_err(db_err)
    }

    /// Flushes memtables of every column to disk.
    pub fn flush(&self) -> Result<()> {
        for column in Column::ALL {
            self.db.flush_cf(self.handle(column)?).map_err(db_err)?;
        }
        Ok(())
    }

    /// Stores `header`, indexes it as canonical at its height and moves the
    /// head to it, in one atomic write.
    pub fn insert_canonical_header(&self, header: &Header) -> Result<()> {
        let hash = header.hash();
        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(self.handle(Column::Headers)?, hash.as_bytes(), header.rlp_encode());
        batch.put_cf(self.handle(Column::Canonical)?, header.number.to_be_bytes(), hash.as_bytes());
        batch.put_cf(self.handle(Column::Meta)?, HEAD_KEY, hash.as_bytes());
        self.db.write(batch).map_err(db_err)?;

        debug!(number = header.number, %hash, "Stored canonical header");
        Ok(())
    }

    /// Header with `hash`, canonical or not.
    pub fn get_header(&self, hash: &H256) -> Result<Option<Header>> {
        self.read(Column::Headers, hash.as_bytes())?
            .map(|bytes| Header::rlp_decode(&bytes).map_err(|e| StorageError::Decode(e.to_string())))
            .transpose()
    }

    /// Canonical hash at `number`.
    pub fn get_canonical_hash(&self, number: u64) -> Result<Option<H256>> {
        self.read_hash(Column::Canonical, &number.to_be_bytes())
    }

    /// Canonical header at `number`.
    pub fn get_header_by_number(&self, number: u64) -> Result<Option<Header>> {
        match self.get_canonical_hash(number)? {
            Some(hash) => self.get_header(&hash),
            None => Ok(None),
        }
    }

    /// Most recently inserted canonical header.
    pub fn head_header(&self) -> Result<Option<Header>> {
        match self.read_hash(Column::Meta, HEAD_KEY)? {
            Some(hash) => self.get_header(&hash),
            None => Ok(None),
        }
    }

    fn read_hash(&self, column: Column, key: &[u8]) -> Result<Option<H256>> {
        self.read(column, key)?
            .map(|bytes| H256::from_slice(&bytes).map_err(|e| StorageError::Decode(e.to_string())))
            .transpose()
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.read(Column::Consensus, key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(Column::Consensus, key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.remove(Column::Consensus, key)
    }
}
