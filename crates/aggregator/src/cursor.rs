//! EVM header traversal: a cursor that walks the chain behind a confirmation depth.
//!
//! The cursor only remembers the last header it handed out. Each
//! [EthHeaderTraversal::next_headers] call returns the next gap-free batch up to
//! `head - confirmation_depth`, or an empty batch when nothing new is safe yet.
//! Persisting the position across restarts is the caller's job (see
//! [crate::EthSynchronizer]).

use crate::client::{ClientError, EthClient};
use crate::header::{BlockHash, BlockHeader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("unable to query latest block: {0}")]
    ChainQueryFailed(#[source] ClientError),
    #[error("latest header unreported")]
    HeadUnreported,
    #[error("error querying blocks by range: {0}")]
    RangeQueryFailed(#[source] ClientError),
    #[error("max batch size must be at least 1")]
    InvalidBatchSize,
    #[error("header traversal ahead of provider: traversed {traversed}, provider safe end {safe_end}")]
    AheadOfProvider { traversed: u64, safe_end: u64 },
    #[error("header traversal and provider mismatched state: expected {expected}, got {got}")]
    ProviderMismatch { expected: u64, got: u64 },
    #[error("chain discontinuity at {height}: parent hash {parent_hash} does not match stored hash {stored_hash}")]
    ChainDiscontinuity {
        height: u64,
        parent_hash: String,
        stored_hash: String,
    },
    #[error("block parent hash not equal parent block hash at {height}")]
    BrokenHeaderChain { height: u64 },
}

impl TraversalError {
    /// Query failures the polling loop may retry. Everything else needs an operator
    /// or a rollback.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraversalError::ChainQueryFailed(_)
                | TraversalError::HeadUnreported
                | TraversalError::RangeQueryFailed(_)
        )
    }
}

/// Header traversal cursor over an [EthClient]. One sequential caller only.
pub struct EthHeaderTraversal<C> {
    client: C,
    latest_header: Option<BlockHeader>,
    last_traversed_header: Option<BlockHeader>,
    confirmation_depth: u64,
}

impl<C: EthClient> EthHeaderTraversal<C> {
    /// `from_header` is the last header already ingested, or `None` to start at height 0.
    pub fn new(client: C, from_header: Option<BlockHeader>, confirmation_depth: u64) -> Self {
        Self {
            client,
            latest_header: None,
            last_traversed_header: from_header,
            confirmation_depth,
        }
    }

    /// Most recently observed chain head (advisory).
    pub fn latest_header(&self) -> Option<&BlockHeader> {
        self.latest_header.as_ref()
    }

    pub fn last_traversed_header(&self) -> Option<&BlockHeader> {
        self.last_traversed_header.as_ref()
    }

    pub fn confirmation_depth(&self) -> u64 {
        self.confirmation_depth
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Next batch of at most `max_size` confirmed headers, continuing from the cursor.
    pub async fn next_headers(&mut self, max_size: u64) -> Result<Vec<BlockHeader>, TraversalError> {
        if max_size == 0 {
            return Err(TraversalError::InvalidBatchSize);
        }
        let head = self
            .client
            .head_header()
            .await
            .map_err(TraversalError::ChainQueryFailed)?
            .ok_or(TraversalError::HeadUnreported)?;
        tracing::debug!(height = head.number, "header traversal latest header");
        let head_number = head.number;
        self.latest_header = Some(head);

        let Some(safe_end) = head_number.checked_sub(self.confirmation_depth) else {
            // Not enough blocks yet at this confirmation depth.
            return Ok(Vec::new());
        };

        if let Some(last) = &self.last_traversed_header {
            if last.number == safe_end {
                return Ok(Vec::new());
            }
            if last.number > safe_end {
                tracing::error!(
                    traversed = last.number,
                    safe_end,
                    "header traversal ahead of provider"
                );
                return Err(TraversalError::AheadOfProvider {
                    traversed: last.number,
                    safe_end,
                });
            }
        }

        let next_height = self
            .last_traversed_header
            .as_ref()
            .map_or(0, |h| h.number + 1);
        let end_height = clamp(next_height, safe_end, max_size);
        let headers = self
            .client
            .headers_by_range(next_height, end_height)
            .await
            .map_err(TraversalError::RangeQueryFailed)?;
        let (Some(first), Some(last)) = (headers.first(), headers.last()) else {
            return Ok(Vec::new());
        };

        if self.last_traversed_header.is_some() && first.number != next_height {
            tracing::error!(
                expected = next_height,
                got = first.number,
                "header traversal and provider mismatched state"
            );
            return Err(TraversalError::ProviderMismatch {
                expected: next_height,
                got: first.number,
            });
        }

        tracing::debug!(from = first.number, to = last.number, "header traversal advanced");
        self.last_traversed_header = Some(last.clone());
        Ok(headers)
    }

    /// Hash-link check for a fetched batch. The first header must build on
    /// `db_latest_header` (when known) and each header on its predecessor.
    pub fn check_header_list_by_hash(
        &self,
        db_latest_header: Option<&BlockHeader>,
        header_list: &[BlockHeader],
    ) -> Result<(), TraversalError> {
        if header_list.len() <= 1 {
            return Ok(());
        }
        if let Some(db_latest) = db_latest_header {
            let first = &header_list[0];
            if first.parent_hash != db_latest.hash {
                tracing::error!(
                    height = first.number,
                    parent_hash = %hash_hex(&first.parent_hash),
                    stored_hash = %db_latest.hash_hex(),
                    "check header list by hash"
                );
                return Err(TraversalError::ChainDiscontinuity {
                    height: first.number,
                    parent_hash: hash_hex(&first.parent_hash),
                    stored_hash: db_latest.hash_hex(),
                });
            }
        }
        for pair in header_list.windows(2) {
            if pair[1].parent_hash != pair[0].hash {
                return Err(TraversalError::BrokenHeaderChain {
                    height: pair[1].number,
                });
            }
        }
        Ok(())
    }

    /// Reset the cursor after the caller dropped everything stored past `header`.
    pub fn change_last_traversed_header_by_del_after(&mut self, header: Option<BlockHeader>) {
        self.last_traversed_header = header;
    }
}

/// End of a window of at most `size` heights starting at `start`, capped at `end`.
fn clamp(start: u64, end: u64, size: u64) -> u64 {
    end.min(start.saturating_add(size - 1))
}

fn hash_hex(hash: &BlockHash) -> String {
    format!("0x{}", hex::encode(hash))
}
