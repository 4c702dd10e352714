//! Key-value engine seam.
//!
//! The engine serializes individual reads and writes and is ordered by key. It offers
//! no transaction spanning separate calls; `write_batch` is the only multi-key atomic
//! operation.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value backend error: {0}")]
    Backend(String),
}

/// Batch operation for [KeyValueStore::write_batch].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Ordered key-value engine. Handles are shared (`&self`); the engine does its own
/// locking per call.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// All operations are applied, or none are.
    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), KvError>;

    /// Entries with `start <= key < end`, ascending by key.
    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<ScanResult, KvError>;

    /// Lowest entry in `[start, end)`.
    fn first_in_range(&self, start: &[u8], end: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        Ok(self.scan_range(start, end)?.into_iter().next())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        (**self).delete(key)
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        (**self).write_batch(operations)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<ScanResult, KvError> {
        (**self).scan_range(start, end)
    }

    fn first_in_range(&self, start: &[u8], end: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        (**self).first_in_range(start, end)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        (**self).delete(key)
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        (**self).write_batch(operations)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<ScanResult, KvError> {
        (**self).scan_range(start, end)
    }

    fn first_in_range(&self, start: &[u8], end: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        (**self).first_in_range(start, end)
    }
}

/// In-memory ordered engine for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        // One write guard for the whole batch.
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<ScanResult, KvError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        Ok(data
            .range(start.to_vec()..end.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn first_in_range(&self, start: &[u8], end: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        if start >= end {
            return Ok(None);
        }
        let data = self.data.read();
        Ok(data
            .range(start.to_vec()..end.to_vec())
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"a").unwrap(), None);
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        store.delete(b"a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn batch_applies_in_order() {
        let store = MemoryStore::new();
        store.put(b"gone", b"x").unwrap();
        store
            .write_batch(vec![
                BatchOperation::put(b"k".to_vec(), b"1".to_vec()),
                BatchOperation::put(b"k".to_vec(), b"2".to_vec()),
                BatchOperation::delete(b"gone".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"gone").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn scan_range_is_half_open_and_sorted() {
        let store = MemoryStore::new();
        for k in [[1u8, 3], [1, 1], [2, 0], [1, 2]] {
            store.put(&k, &[k[1]]).unwrap();
        }
        let out = store.scan_range(&[1], &[2]).unwrap();
        let keys: Vec<_> = out.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![1, 1], vec![1, 2], vec![1, 3]]);
        assert!(store.scan_range(&[2], &[1]).unwrap().is_empty());
        assert_eq!(store.first_in_range(&[1], &[2]).unwrap(), Some((vec![1, 1], vec![1])));
        assert_eq!(store.first_in_range(&[3], &[4]).unwrap(), None);
    }

    #[test]
    fn shared_handles_see_same_data() {
        let store = Arc::new(MemoryStore::new());
        let other = Arc::clone(&store);
        other.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        let by_ref: &MemoryStore = &store;
        assert_eq!(KeyValueStore::get(&by_ref, b"k").unwrap(), Some(b"v".to_vec()));
    }
}
