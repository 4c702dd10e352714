//! Finality-provider aggregator core: EVM header ingestion and the Babylon stake ledger.
//!
//! - **EthHeaderTraversal**: cursor over EVM headers behind a confirmation depth; returns
//!   gap-free batches and reports provider regressions, mismatches and hash-chain breaks.
//! - **EthSynchronizer**: polling loop that persists traversed headers and rolls back
//!   stored history on a chain discontinuity.
//! - **Storage**: typed records over an ordered [KeyValueStore], including the stake
//!   ledger (delegate/undelegate aggregation, per-batch snapshots, signed-stake totals).

pub mod client;
pub mod config;
pub mod cursor;
pub mod header;
pub mod store;
pub mod synchronizer;

pub use client::{ClientError, EthClient, HttpEthClient};
pub use config::{ReconnectionConfig, SynchronizerConfig};
pub use cursor::{EthHeaderTraversal, TraversalError};
pub use header::{decode_block_header, BlockHash, BlockHeader};
pub use store::stake::{
    DelegationEvent, QuorumNode, StakeDetails, StakeKind, Staker, SymbioticFpIds,
    SymbioticSignRequest,
};
pub use store::{BatchOperation, KeyValueStore, KvError, MemoryStore, Storage, StoreError};
#[cfg(feature = "rocksdb")]
pub use store::{RocksDbConfig, RocksDbStore};
pub use synchronizer::{EthSynchronizer, SyncError};
