//! Protocol constants. All monetary values in becks (1 BECK = 10^8 becks).

pub const COIN: u64 = 100_000_000;

/// Maximum serialized transaction size accepted by the pool, in bytes.
pub const MAX_TX_SIZE: usize = 100_000;

/// Minimum relay fee in becks. Transactions paying less are rejected.
pub const MIN_TX_FEE: u64 = 1_000;

/// Maximum coinbase data (witness signature field) in bytes.
pub const MAX_COINBASE_DATA: usize = 100;

/// Confirmations required before a coinbase output may be spent.
pub const COINBASE_MATURITY: u64 = 100;

/// Default maximum number of transactions in the pool.
pub const DEFAULT_MAX_COUNT: usize = 5_000;

/// Default maximum total serialized bytes in the pool (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Default maximum number of parked orphan transactions.
pub const DEFAULT_MAX_ORPHANS: usize = 100;

/// Upper bound on negative-cache entries before FIFO trimming.
pub const MAX_REJECT_ENTRIES: usize = 40_000;

/// Lock-time values at or above this threshold are Unix timestamps,
/// compared against chain time; below it they are block heights.
pub const LOCKTIME_TIME_THRESHOLD: u64 = 500_000_000;

/// Upper bound on orphan-resolution cascade depth after a commit.
///
/// Outpoints reference earlier transactions, so cycles cannot occur; the
/// bound caps work done in a single admission when a long chain unparks.
pub const MAX_CASCADE_DEPTH: usize = 32;
