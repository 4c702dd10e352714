//! Persisted EVM headers and the scanned-height marker.
//!
//! The marker is the resume point for the header traversal: it always names the
//! newest stored header.

use super::{keys, BatchOperation, KeyValueStore, Storage, StoreError};
use crate::header::BlockHeader;

impl<S: KeyValueStore> Storage<S> {
    /// Store a traversed batch and move the scanned-height marker to its last header,
    /// in one atomic write.
    pub fn put_eth_headers(&self, headers: &[BlockHeader]) -> Result<(), StoreError> {
        let Some(last) = headers.last() else {
            return Ok(());
        };
        let mut ops = Vec::with_capacity(headers.len() + 1);
        for header in headers {
            ops.push(BatchOperation::put(
                keys::eth_block_header_key(header.number),
                serde_json::to_vec(header)?,
            ));
        }
        ops.push(BatchOperation::put(
            keys::eth_scanned_height_key(),
            serde_json::to_vec(&last.number)?,
        ));
        self.db.write_batch(ops)?;
        Ok(())
    }

    pub fn get_eth_header(&self, height: u64) -> Result<Option<BlockHeader>, StoreError> {
        self.get_json(&keys::eth_block_header_key(height))
    }

    pub fn eth_scanned_height(&self) -> Result<Option<u64>, StoreError> {
        self.get_json(&keys::eth_scanned_height_key())
    }

    /// Header at the scanned-height marker, if any. A marker without its header is
    /// reported as missing.
    pub fn latest_eth_header(&self) -> Result<Option<BlockHeader>, StoreError> {
        match self.eth_scanned_height()? {
            Some(height) => self
                .get_eth_header(height)?
                .map(Some)
                .ok_or(StoreError::NotFound("eth header at scanned height")),
            None => Ok(None),
        }
    }

    /// Lowest stored header (the traversal may have started above genesis).
    pub fn oldest_eth_header(&self) -> Result<Option<BlockHeader>, StoreError> {
        let start = vec![keys::ETH_BLOCK_HEADER_PREFIX];
        let end = vec![keys::ETH_BLOCK_HEADER_PREFIX + 1];
        match self.db.first_in_range(&start, &end)? {
            Some((_, bytes)) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete every stored header above `height` and move the marker back to it.
    /// Returns the number of headers removed.
    pub fn delete_eth_headers_after(&self, height: u64) -> Result<usize, StoreError> {
        let start = height
            .checked_add(1)
            .map(keys::eth_block_header_key)
            .unwrap_or_else(|| vec![keys::ETH_BLOCK_HEADER_PREFIX + 1]);
        let end = vec![keys::ETH_BLOCK_HEADER_PREFIX + 1];
        let stale = self.db.scan_range(&start, &end)?;
        let removed = stale.len();
        let mut ops: Vec<BatchOperation> = stale
            .into_iter()
            .map(|(key, _)| BatchOperation::delete(key))
            .collect();
        ops.push(BatchOperation::put(
            keys::eth_scanned_height_key(),
            serde_json::to_vec(&height)?,
        ));
        self.db.write_batch(ops)?;
        tracing::info!(height, removed, "deleted eth headers after height");
        Ok(removed)
    }

    /// Drop every stored header and the marker.
    pub fn clear_eth_headers(&self) -> Result<usize, StoreError> {
        let start = vec![keys::ETH_BLOCK_HEADER_PREFIX];
        let end = vec![keys::ETH_BLOCK_HEADER_PREFIX + 1];
        let stale = self.db.scan_range(&start, &end)?;
        let removed = stale.len();
        let mut ops: Vec<BatchOperation> = stale
            .into_iter()
            .map(|(key, _)| BatchOperation::delete(key))
            .collect();
        ops.push(BatchOperation::delete(keys::eth_scanned_height_key()));
        self.db.write_batch(ops)?;
        tracing::info!(removed, "cleared eth headers");
        Ok(removed)
    }
}
