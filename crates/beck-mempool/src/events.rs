//! Pool notifications for relay and wallet collaborators.
//!
//! Events are emitted inside the pool's serialized section, so the order
//! observed on a [`tokio::sync::broadcast`] receiver matches the order in
//! which the pipeline committed the corresponding state changes.

use beck_core::types::{Hash256, OutPoint};

/// Why a pooled transaction was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Confirmed by a connected block.
    Mined,
    /// Lost a double-spend race against a confirmed transaction (directly
    /// or as an in-pool descendant of the loser).
    Conflict,
}

/// An observable pool state change.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A transaction reached the pool.
    TransactionAdded {
        txid: Hash256,
        fee: u64,
        size: usize,
    },
    /// A pooled transaction was removed.
    TransactionRemoved {
        txid: Hash256,
        reason: RemovalReason,
    },
    /// A transaction was parked in the orphan pool.
    OrphanParked {
        txid: Hash256,
        missing: Vec<OutPoint>,
    },
    /// A block was applied to the pool.
    BlockProcessed {
        hash: Hash256,
        height: u64,
        mined: usize,
        evicted: usize,
    },
}
