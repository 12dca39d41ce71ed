//! Pool configuration.

use beck_core::constants::{
    DEFAULT_MAX_BYTES, DEFAULT_MAX_COUNT, DEFAULT_MAX_ORPHANS, MAX_REJECT_ENTRIES,
};

/// Size and retention limits for the pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled transactions.
    pub max_count: usize,
    /// Maximum total serialized bytes of pooled transactions.
    pub max_bytes: usize,
    /// Maximum number of parked orphans; oldest are dropped first.
    pub max_orphans: usize,
    /// Maximum negative-cache entries before FIFO trimming.
    pub max_reject_entries: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            max_bytes: DEFAULT_MAX_BYTES,
            max_orphans: DEFAULT_MAX_ORPHANS,
            max_reject_entries: MAX_REJECT_ENTRIES,
        }
    }
}
