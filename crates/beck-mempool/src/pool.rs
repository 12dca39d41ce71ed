//! Pool entry storage and the serialized pool state.
//!
//! [`PoolState`] bundles everything the admission pipeline mutates —
//! entries, coin view, orphan pool, reject filter, accounting — so a single
//! `Mutex<PoolState>` is the pool's one critical section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use beck_core::traits::{ChainView, ScriptFlags};
use beck_core::types::{Coin, Hash256, LockingPredicate, OutPoint, Transaction};

use crate::coin_view::CoinViewOverlay;
use crate::config::PoolConfig;
use crate::error::CoinViewError;
use crate::orphan::OrphanPool;
use crate::reject::RejectFilter;

/// An admitted transaction with its pool-local metadata.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The unconfirmed transaction.
    pub tx: Transaction,
    /// Identity hash.
    pub txid: Hash256,
    /// Witness hash.
    pub wtxid: Hash256,
    /// Fee in becks (`total_input - total_output`).
    pub fee: u64,
    /// Serialized size in bytes, witness included.
    pub size: usize,
    /// Insertion sequence, for insertion-order history.
    pub sequence: u64,
    /// Snapshot of the coins this transaction spent, in input order. Needed
    /// to undo its coin-view effects on removal.
    pub spent_coins: Vec<(OutPoint, Coin)>,
}

/// Everything the pipeline's serialized section owns.
pub(crate) struct PoolState {
    pub entries: HashMap<Hash256, MempoolEntry>,
    pub coins: CoinViewOverlay,
    pub orphans: OrphanPool,
    pub rejects: RejectFilter,
    /// Txids in insertion order; compacted lazily against `entries`.
    history: Vec<Hash256>,
    pub total_bytes: usize,
    next_sequence: u64,
    /// Script flags observed at the last block event, compared on
    /// disconnect to decide whether the reject filter must fully reset.
    pub pinned_flags: ScriptFlags,
}

impl PoolState {
    pub fn new(chain: Arc<dyn ChainView>, config: &PoolConfig) -> Self {
        let pinned_flags = chain.script_flags();
        Self {
            entries: HashMap::new(),
            coins: CoinViewOverlay::new(chain),
            orphans: OrphanPool::new(config.max_orphans),
            rejects: RejectFilter::new(config.max_reject_entries),
            history: Vec::new(),
            total_bytes: 0,
            next_sequence: 0,
            pinned_flags,
        }
    }

    /// Install a committed entry into all indices.
    pub fn insert_entry(
        &mut self,
        tx: Transaction,
        txid: Hash256,
        wtxid: Hash256,
        fee: u64,
        size: usize,
        spent_coins: Vec<(OutPoint, Coin)>,
        height: u64,
    ) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.coins.apply(&tx, txid, height);
        self.total_bytes += size;
        self.history.push(txid);
        self.entries.insert(
            txid,
            MempoolEntry {
                tx,
                txid,
                wtxid,
                fee,
                size,
                sequence,
                spent_coins,
            },
        );
    }

    /// Remove a confirmed entry without undoing its coin-view effects.
    pub fn remove_confirmed_entry(&mut self, txid: &Hash256) -> Option<MempoolEntry> {
        let entry = self.entries.remove(txid)?;
        self.coins.remove_confirmed(&entry.tx, entry.txid);
        self.total_bytes -= entry.size;
        Some(entry)
    }

    /// Remove an entry and roll back its coin-view effects.
    ///
    /// The caller must have removed in-pool dependents first; a remaining
    /// dependent surfaces as a [`CoinViewError`].
    pub fn remove_entry_with_undo(
        &mut self,
        txid: &Hash256,
    ) -> Result<Option<MempoolEntry>, CoinViewError> {
        let Some(entry) = self.entries.remove(txid) else {
            return Ok(None);
        };
        if let Err(e) = self.coins.undo(&entry.tx, entry.txid, &entry.spent_coins) {
            // Keep state consistent for the caller's post-mortem.
            self.entries.insert(*txid, entry);
            return Err(e);
        }
        self.total_bytes -= entry.size;
        Ok(Some(entry))
    }

    /// Txids of pooled transactions spending any output of `txid`, i.e. its
    /// direct in-pool dependents.
    pub fn direct_dependents(&self, txid: &Hash256) -> Vec<Hash256> {
        let Some(entry) = self.entries.get(txid) else {
            return Vec::new();
        };
        entry
            .tx
            .created_outpoints()
            .iter()
            .filter_map(|op| self.coins.spender_of(op))
            .filter(|spender| self.entries.contains_key(spender))
            .collect()
    }

    /// Sum of unspent unconfirmed coin values paying any watched key hash.
    pub fn balance(&self, watched: &HashSet<Hash256>) -> u64 {
        self.coins
            .unconfirmed_coins()
            .filter_map(|(_, coin)| match &coin.lock {
                LockingPredicate::KeyHash(key) if watched.contains(key) => Some(coin.value),
                _ => None,
            })
            .sum()
    }

    /// Pooled transactions in insertion order.
    pub fn history(&mut self) -> Vec<Transaction> {
        self.compact_history();
        self.history
            .iter()
            .filter_map(|txid| self.entries.get(txid))
            .map(|entry| entry.tx.clone())
            .collect()
    }

    /// Drop removed txids from the history vector once they dominate it.
    fn compact_history(&mut self) {
        if self.history.len() > 64 && self.history.len() > self.entries.len() * 2 {
            let entries = &self.entries;
            self.history.retain(|txid| entries.contains_key(txid));
        }
    }

    /// Total fees of all pooled transactions.
    pub fn total_fees(&self) -> u64 {
        self.entries.values().map(|e| e.fee).sum()
    }
}
