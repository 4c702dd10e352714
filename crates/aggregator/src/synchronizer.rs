//! EthSynchronizer: drives the header traversal and persists what it returns.
//!
//! Each step fetches the next confirmed batch, checks that it hash-links onto the
//! newest stored header, and stores it together with the scanned-height marker. A
//! batch that does not link onto stored history triggers a rollback of
//! `rollback_depth` blocks; the cursor is reset to the new stored tip and traversal
//! resumes from there.

use crate::client::{ClientError, EthClient};
use crate::config::SynchronizerConfig;
use crate::cursor::{EthHeaderTraversal, TraversalError};
use crate::header::BlockHeader;
use crate::store::{KeyValueStore, Storage, StoreError};
use rand::Rng;
use thiserror::Error;
use tokio::time::{sleep, Duration};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("chain client: {0}")]
    Client(#[from] ClientError),
    #[error("start header {0} unavailable from provider")]
    StartHeaderUnavailable(u64),
    #[error("chain discontinuity at oldest stored header {0}, cannot roll back further")]
    RollbackExhausted(u64),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Traversal(e) => e.is_transient(),
            SyncError::Client(_) => true,
            _ => false,
        }
    }
}

/// Sequential EVM header synchronizer over one traversal and one store handle.
pub struct EthSynchronizer<C, S> {
    traversal: EthHeaderTraversal<C>,
    storage: Storage<S>,
    config: SynchronizerConfig,
}

impl<C: EthClient, S: KeyValueStore> EthSynchronizer<C, S> {
    /// Resume from the newest stored header; on an empty store, start at
    /// `config.start_height` (its parent header is fetched and stored as the anchor)
    /// or at genesis.
    pub async fn new(client: C, storage: Storage<S>, config: SynchronizerConfig) -> Result<Self, SyncError> {
        let from_header = match storage.latest_eth_header()? {
            Some(header) => {
                tracing::info!(height = header.number, hash = %header.hash_hex(), "resuming eth sync");
                Some(header)
            }
            None => match config.start_height {
                Some(start) if start > 0 => {
                    let anchor = start - 1;
                    let header = client
                        .headers_by_range(anchor, anchor)
                        .await?
                        .into_iter()
                        .find(|h| h.number == anchor)
                        .ok_or(SyncError::StartHeaderUnavailable(anchor))?;
                    storage.put_eth_headers(std::slice::from_ref(&header))?;
                    tracing::info!(height = start, "starting eth sync");
                    Some(header)
                }
                _ => {
                    tracing::info!("starting eth sync from genesis");
                    None
                }
            },
        };
        let traversal = EthHeaderTraversal::new(client, from_header, config.confirmation_depth);
        Ok(Self {
            traversal,
            storage,
            config,
        })
    }

    pub fn traversal(&self) -> &EthHeaderTraversal<C> {
        &self.traversal
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage<S> {
        &mut self.storage
    }

    pub fn into_storage(self) -> Storage<S> {
        self.storage
    }

    /// One traversal step. Returns the number of headers stored (0 when caught up or
    /// after a rollback).
    pub async fn tick(&mut self) -> Result<usize, SyncError> {
        let headers = self.traversal.next_headers(self.config.max_batch_size).await?;
        let (Some(first), Some(last)) = (headers.first(), headers.last()) else {
            return Ok(0);
        };
        let db_latest = self.storage.latest_eth_header()?;

        // The batch check skips single-header batches, so the stored tip is checked here
        // for every batch.
        let linked = match &db_latest {
            Some(stored) if first.parent_hash != stored.hash => Err(TraversalError::ChainDiscontinuity {
                height: first.number,
                parent_hash: format!("0x{}", hex::encode(first.parent_hash)),
                stored_hash: stored.hash_hex(),
            }),
            _ => self
                .traversal
                .check_header_list_by_hash(db_latest.as_ref(), &headers),
        };
        match linked {
            Ok(()) => {}
            Err(TraversalError::ChainDiscontinuity { .. }) => {
                if let Some(stored) = &db_latest {
                    if let Err(e) = self.rollback(stored) {
                        self.traversal.change_last_traversed_header_by_del_after(db_latest);
                        return Err(e);
                    }
                }
                return Ok(0);
            }
            Err(e) => {
                // The batch is not stored; do not let the cursor skip it.
                self.traversal.change_last_traversed_header_by_del_after(db_latest);
                return Err(e.into());
            }
        }

        if let Err(e) = self.storage.put_eth_headers(&headers) {
            self.traversal.change_last_traversed_header_by_del_after(db_latest);
            return Err(e.into());
        }
        tracing::info!(from = first.number, to = last.number, "stored eth headers");
        Ok(headers.len())
    }

    /// Rewind stored headers to `rollback_depth` blocks below `stored`, never below
    /// the oldest stored header, and point the cursor at the new tip.
    fn rollback(&mut self, stored: &BlockHeader) -> Result<(), SyncError> {
        let floor = self
            .storage
            .oldest_eth_header()?
            .map_or(stored.number, |h| h.number);
        let target = stored
            .number
            .saturating_sub(self.config.rollback_depth)
            .max(floor);
        if target == stored.number {
            return Err(SyncError::RollbackExhausted(target));
        }
        tracing::warn!(
            from = stored.number,
            to = target,
            "eth chain discontinuity, rolling back stored headers"
        );
        self.storage.delete_eth_headers_after(target)?;
        let header = self.storage.get_eth_header(target)?;
        self.traversal.change_last_traversed_header_by_del_after(header);
        Ok(())
    }

    /// Step until a non-transient error. Transient query failures back off with jitter.
    pub async fn run(&mut self) -> Result<(), SyncError> {
        let interval = Duration::from_millis(self.config.loop_interval_ms);
        let mut failures: u32 = 0;
        loop {
            match self.tick().await {
                Ok(stored) => {
                    failures = 0;
                    if stored == 0 {
                        sleep(interval).await;
                    }
                }
                Err(e) if e.is_transient() => {
                    failures = failures.saturating_add(1);
                    let base = Duration::from_secs(self.config.reconnection.backoff_secs(failures));
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    tracing::warn!(reason = %e, attempt = failures, "eth sync step failed, retrying");
                    sleep(base + jitter).await;
                }
                Err(e) => {
                    tracing::error!(reason = %e, "eth sync halted");
                    return Err(e);
                }
            }
        }
    }
}
