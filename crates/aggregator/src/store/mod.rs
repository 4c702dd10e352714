//! Aggregator storage: typed records over a [KeyValueStore].
//!
//! Records are JSON documents keyed through [keys]. Reads take `&self`; operations
//! that read, modify and write back a record take `&mut self`, so the borrow checker
//! keeps a single writer per [Storage] value.

pub mod headers;
pub mod keys;
pub mod kv;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod stake;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use kv::{BatchOperation, KeyValueStore, KvError, MemoryStore};
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksDbConfig, RocksDbStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("the database does not have stake data")]
    NoStakeData,
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] KvError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Typed record access over an explicitly passed engine handle.
#[derive(Debug)]
pub struct Storage<S> {
    db: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(db: S) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &S {
        &self.db
    }

    pub fn into_inner(self) -> S {
        self.db
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put(key, &bytes)?;
        Ok(())
    }
}
