//! Common helpers for integration tests.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use aggregator::{BlockHeader, ClientError, EthClient};
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("aggregator=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

/// Deterministic block hash for `number` on branch `fork`.
pub fn block_hash(number: u64, fork: u8) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(number.to_be_bytes());
    hasher.update([fork]);
    hasher.finalize().into()
}

#[derive(Default)]
struct ChainState {
    headers: Vec<BlockHeader>,
    head_unreported: bool,
    fail_head: bool,
    fail_range: bool,
    range_offset: u64,
    range_calls: Vec<(u64, u64)>,
}

impl ChainState {
    fn push(&mut self, fork: u8) {
        let number = self.headers.len() as u64;
        let parent_hash = self.headers.last().map_or([0u8; 32], |h| h.hash);
        self.headers.push(BlockHeader {
            number,
            hash: block_hash(number, fork),
            parent_hash,
            timestamp: 1_700_000_000 + number * 12,
        });
    }
}

/// In-memory EVM chain. Clones share state, so a test can move the chain while a
/// traversal owns its own handle.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    /// Chain with headers `0..=head`.
    pub fn with_head(head: u64) -> Self {
        let chain = Self::default();
        chain.extend_to(head, 0);
        chain
    }

    /// Mine on branch `fork` until the head is `head`.
    pub fn extend_to(&self, head: u64, fork: u8) {
        let mut s = self.state.lock();
        while (s.headers.len() as u64) <= head {
            s.push(fork);
        }
    }

    /// Replace every header from `height` up with branch `fork`, keeping the head height.
    pub fn reorg_from(&self, height: u64, fork: u8) {
        let head = {
            let mut s = self.state.lock();
            let head = s.headers.len() as u64 - 1;
            s.headers.truncate(height as usize);
            head
        };
        self.extend_to(head, fork);
    }

    /// Drop every header above `head` (provider regressed).
    pub fn truncate_to(&self, head: u64) {
        self.state.lock().headers.truncate(head as usize + 1);
    }

    /// Give header `number` a parent hash that links to nothing.
    pub fn corrupt_parent(&self, number: u64) {
        self.state.lock().headers[number as usize].parent_hash = [0xee; 32];
    }

    pub fn header(&self, number: u64) -> BlockHeader {
        self.state.lock().headers[number as usize].clone()
    }

    pub fn head(&self) -> u64 {
        self.state.lock().headers.len() as u64 - 1
    }

    pub fn set_head_unreported(&self, on: bool) {
        self.state.lock().head_unreported = on;
    }

    pub fn set_fail_head(&self, on: bool) {
        self.state.lock().fail_head = on;
    }

    pub fn set_fail_range(&self, on: bool) {
        self.state.lock().fail_range = on;
    }

    /// Answer range queries shifted by `offset` heights (a misbehaving provider).
    pub fn set_range_offset(&self, offset: u64) {
        self.state.lock().range_offset = offset;
    }

    /// Every `(start, end)` passed to `headers_by_range` so far.
    pub fn range_calls(&self) -> Vec<(u64, u64)> {
        self.state.lock().range_calls.clone()
    }
}

impl EthClient for MockChain {
    async fn head_header(&self) -> Result<Option<BlockHeader>, ClientError> {
        let s = self.state.lock();
        if s.fail_head {
            return Err(ClientError::Rpc("connection refused".into()));
        }
        if s.head_unreported {
            return Ok(None);
        }
        Ok(s.headers.last().cloned())
    }

    async fn headers_by_range(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, ClientError> {
        let mut s = self.state.lock();
        s.range_calls.push((start, end));
        if s.fail_range {
            return Err(ClientError::Rpc("range query failed".into()));
        }
        let (start, end) = (start + s.range_offset, end + s.range_offset);
        Ok(s.headers
            .iter()
            .filter(|h| h.number >= start && h.number <= end)
            .cloned()
            .collect())
    }
}
