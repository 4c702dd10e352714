//! RocksDB engine for [KeyValueStore]. Enabled with the `rocksdb` feature.
//!
//! One default column family; record kinds are separated by the key prefix.

use super::kv::{BatchOperation, KeyValueStore, KvError, ScanResult};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory; created when missing.
    pub path: PathBuf,
    /// fsync every write.
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sync_writes: true,
        }
    }

    /// Same directory handling, no fsync.
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            sync_writes: false,
            ..Self::new(path)
        }
    }
}

pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

fn backend(op: &str, e: rocksdb::Error) -> KvError {
    KvError::Backend(format!("rocksdb {} failed: {}", op, e))
}

impl RocksDbStore {
    pub fn open(config: RocksDbConfig) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let db = DB::open(&opts, &config.path).map_err(|e| backend("open", e))?;
        tracing::info!(path = %config.path.display(), "opened rocksdb store");
        Ok(Self { db, config })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KvError> {
        Self::open(RocksDbConfig::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn range_iter<'a>(
        &'a self,
        start: &'a [u8],
        end: &'a [u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>), KvError>> + 'a {
        self.db
            .iterator(IteratorMode::From(start, Direction::Forward))
            .map(|item| {
                item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| backend("scan", e))
            })
            .take_while(move |item| match item {
                Ok((key, _)) => key.as_slice() < end,
                Err(_) => true,
            })
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db.get(key).map_err(|e| backend("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| backend("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| backend("delete", e))
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| backend("batch write", e))
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<ScanResult, KvError> {
        if start >= end {
            return Ok(Vec::new());
        }
        self.range_iter(start, end).collect()
    }

    fn first_in_range(&self, start: &[u8], end: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        if start >= end {
            return Ok(None);
        }
        self.range_iter(start, end).next().transpose()
    }
}
