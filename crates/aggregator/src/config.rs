//! Synchronizer configuration.

/// EVM synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    /// HTTP RPC URL of the EVM node (eth_getBlockByNumber).
    pub http_url: String,
    /// First height to ingest when nothing is stored yet. `None` starts at genesis.
    pub start_height: Option<u64>,
    /// Blocks below the head that are still considered unsafe.
    pub confirmation_depth: u64,
    /// Max headers fetched per traversal step.
    pub max_batch_size: u64,
    /// Pause between traversal steps once caught up.
    pub loop_interval_ms: u64,
    /// Blocks to rewind when the stored chain no longer links to the provider's.
    pub rollback_depth: u64,
    /// Retry backoff for transient chain query failures.
    pub reconnection: ReconnectionConfig,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            http_url: "http://127.0.0.1:8545".to_string(),
            start_height: None,
            confirmation_depth: 6,
            max_batch_size: 100,
            loop_interval_ms: 1_000,
            rollback_depth: 10,
            reconnection: ReconnectionConfig::default(),
        }
    }
}

/// Retry backoff (initial and max seconds).
#[derive(Debug, Clone)]
pub struct ReconnectionConfig {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 1,
            max_backoff_secs: 60,
        }
    }
}

impl ReconnectionConfig {
    /// Backoff before retry number `attempt` (1-based), doubling up to the max.
    pub fn backoff_secs(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.initial_backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs)
    }
}
