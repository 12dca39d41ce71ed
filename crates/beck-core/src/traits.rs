//! Trait interfaces between crates.
//!
//! [`ChainView`] is the read-only chain authority consumed by the pool:
//! current tip height/time, the active script-flag set, and confirmed coin
//! lookups. The full node implements it over its block store;
//! [`MemoryChainView`] is the in-memory implementation used by tests.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{Coin, OutPoint};

/// Bit set of active script-validation rules.
///
/// Carried into every verification job so that a rule activation at a reorg
/// boundary is observable by the pool (which must then reset its negative
/// cache).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct ScriptFlags(pub u32);

impl ScriptFlags {
    /// No rules active.
    pub const NONE: Self = Self(0);
    /// Reject witnesses on inputs whose predicate requires none.
    pub const STRICT_WITNESS: Self = Self(1);
    /// Enforce transaction lock times against the current tip.
    pub const ENFORCE_LOCKTIME: Self = Self(1 << 1);

    /// All currently defined rules.
    pub fn all() -> Self {
        Self(Self::STRICT_WITNESS.0 | Self::ENFORCE_LOCKTIME.0)
    }

    /// Whether every bit of `flag` is set in `self`.
    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Union of two flag sets.
    pub fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }
}

impl Default for ScriptFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Read-only view of the confirmed chain.
///
/// Supplies the tip height/time for locktime decisions, the active script
/// flags, and confirmed coin lookups that the pool's coin-view overlay falls
/// through to. Never mutated by the pool.
pub trait ChainView: Send + Sync {
    /// Current chain tip height.
    fn height(&self) -> u64;

    /// Current chain time (Unix seconds, typically the tip's median time).
    fn time(&self) -> u64;

    /// Script-validation rules active at the current tip.
    fn script_flags(&self) -> ScriptFlags;

    /// Look up a confirmed coin by outpoint. Returns `None` if spent or unknown.
    fn coin(&self, outpoint: &OutPoint) -> Option<Coin>;

    /// Check whether a confirmed coin exists and is unspent.
    ///
    /// Default implementation delegates to [`coin`](Self::coin).
    fn contains_coin(&self, outpoint: &OutPoint) -> bool {
        self.coin(outpoint).is_some()
    }
}

/// In-memory chain view for testing.
///
/// Height, time, flags, and the coin map are all settable through shared
/// references so tests can advance the chain underneath a running pool.
pub struct MemoryChainView {
    inner: RwLock<ChainViewState>,
}

struct ChainViewState {
    height: u64,
    time: u64,
    flags: ScriptFlags,
    coins: HashMap<OutPoint, Coin>,
}

impl MemoryChainView {
    /// Create an empty view at height 0 with default flags.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ChainViewState {
                height: 0,
                time: 0,
                flags: ScriptFlags::default(),
                coins: HashMap::new(),
            }),
        }
    }

    /// Set the tip height.
    pub fn set_height(&self, height: u64) {
        self.inner.write().height = height;
    }

    /// Set the chain time.
    pub fn set_time(&self, time: u64) {
        self.inner.write().time = time;
    }

    /// Replace the active script flags.
    pub fn set_script_flags(&self, flags: ScriptFlags) {
        self.inner.write().flags = flags;
    }

    /// Insert a confirmed coin.
    pub fn add_coin(&self, outpoint: OutPoint, coin: Coin) {
        self.inner.write().coins.insert(outpoint, coin);
    }

    /// Remove a confirmed coin (spent by a block).
    pub fn remove_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.inner.write().coins.remove(outpoint)
    }

    /// Number of confirmed coins in the view.
    pub fn coin_count(&self) -> usize {
        self.inner.read().coins.len()
    }
}

impl Default for MemoryChainView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainView for MemoryChainView {
    fn height(&self) -> u64 {
        self.inner.read().height
    }

    fn time(&self) -> u64 {
        self.inner.read().time
    }

    fn script_flags(&self) -> ScriptFlags {
        self.inner.read().flags
    }

    fn coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.inner.read().coins.get(outpoint).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash256, LockingPredicate, Provenance};

    fn coin(value: u64) -> Coin {
        Coin {
            value,
            lock: LockingPredicate::Open,
            height: 1,
            is_coinbase: false,
            provenance: Provenance::Confirmed,
        }
    }

    fn outpoint(seed: u8) -> OutPoint {
        OutPoint {
            txid: Hash256([seed; 32]),
            index: 0,
        }
    }

    // --- ScriptFlags ---

    #[test]
    fn flags_contains() {
        let flags = ScriptFlags::all();
        assert!(flags.contains(ScriptFlags::STRICT_WITNESS));
        assert!(flags.contains(ScriptFlags::ENFORCE_LOCKTIME));
        assert!(!ScriptFlags::NONE.contains(ScriptFlags::STRICT_WITNESS));
    }

    #[test]
    fn flags_with_unions() {
        let flags = ScriptFlags::NONE.with(ScriptFlags::STRICT_WITNESS);
        assert!(flags.contains(ScriptFlags::STRICT_WITNESS));
        assert!(!flags.contains(ScriptFlags::ENFORCE_LOCKTIME));
    }

    #[test]
    fn default_flags_enable_all_rules() {
        assert_eq!(ScriptFlags::default(), ScriptFlags::all());
    }

    // --- MemoryChainView ---

    #[test]
    fn new_view_is_empty() {
        let view = MemoryChainView::new();
        assert_eq!(view.height(), 0);
        assert_eq!(view.time(), 0);
        assert_eq!(view.coin_count(), 0);
        assert!(view.coin(&outpoint(1)).is_none());
    }

    #[test]
    fn settable_height_and_time() {
        let view = MemoryChainView::new();
        view.set_height(42);
        view.set_time(1_700_000_000);
        assert_eq!(view.height(), 42);
        assert_eq!(view.time(), 1_700_000_000);
    }

    #[test]
    fn coin_insert_lookup_remove() {
        let view = MemoryChainView::new();
        let op = outpoint(1);
        view.add_coin(op.clone(), coin(500));

        assert!(view.contains_coin(&op));
        assert_eq!(view.coin(&op).unwrap().value, 500);

        view.remove_coin(&op);
        assert!(!view.contains_coin(&op));
    }

    #[test]
    fn flags_settable() {
        let view = MemoryChainView::new();
        view.set_script_flags(ScriptFlags::NONE);
        assert_eq!(view.script_flags(), ScriptFlags::NONE);
    }
}
