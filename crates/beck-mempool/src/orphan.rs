//! The orphan pool: transactions waiting on unresolved parent outputs.
//!
//! An orphan is indexed by its own txid and under every missing outpoint it
//! waits on; one outpoint may gate several orphans, and one orphan may wait
//! on several outpoints. Resolution and eviction remove the orphan from
//! every waiting set so no dangling references remain. No verification
//! happens while a transaction is parked — unresolved is not invalid.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use beck_core::types::{Hash256, OutPoint, Transaction};

/// A parked transaction with the outpoints it waits on.
#[derive(Debug, Clone)]
struct OrphanEntry {
    tx: Transaction,
    missing: HashSet<OutPoint>,
    seq: u64,
}

/// Pool of transactions whose inputs are not yet resolvable.
pub struct OrphanPool {
    entries: HashMap<Hash256, OrphanEntry>,
    /// Missing outpoint → txids of orphans waiting on it.
    by_outpoint: HashMap<OutPoint, HashSet<Hash256>>,
    /// Insertion sequence → txid, for oldest-first eviction.
    order: BTreeMap<u64, Hash256>,
    next_seq: u64,
    max_orphans: usize,
}

impl OrphanPool {
    /// Create an orphan pool retaining at most `max_orphans` transactions.
    pub fn new(max_orphans: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_outpoint: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            max_orphans,
        }
    }

    /// Park a transaction under each of its missing outpoints.
    ///
    /// Idempotent for a txid already parked. When the pool is full the
    /// oldest orphan is dropped to make room.
    pub fn park(&mut self, tx: Transaction, missing: Vec<OutPoint>) -> Hash256 {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return txid;
        }

        while self.entries.len() >= self.max_orphans {
            let Some((_, oldest)) = self.order.iter().next().map(|(s, t)| (*s, *t)) else {
                break;
            };
            debug!(txid = %oldest, "dropping oldest orphan to make room");
            self.evict(&oldest);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        for outpoint in &missing {
            self.by_outpoint
                .entry(outpoint.clone())
                .or_default()
                .insert(txid);
        }
        self.order.insert(seq, txid);
        self.entries.insert(
            txid,
            OrphanEntry {
                tx,
                missing: missing.into_iter().collect(),
                seq,
            },
        );

        txid
    }

    /// Remove and return every orphan waiting on this outpoint.
    ///
    /// The returned transactions are candidates for re-submission, not
    /// guaranteed admissions: other inputs may still be missing (they will
    /// re-park) and all other admission checks still apply.
    pub fn resolve(&mut self, outpoint: &OutPoint) -> Vec<Transaction> {
        let Some(waiters) = self.by_outpoint.remove(outpoint) else {
            return Vec::new();
        };

        let mut released = Vec::with_capacity(waiters.len());
        for txid in waiters {
            if let Some(entry) = self.remove_entry(&txid) {
                released.push(entry.tx);
            }
        }
        released
    }

    /// Explicitly remove an orphan from all waiting sets.
    pub fn evict(&mut self, txid: &Hash256) -> Option<Transaction> {
        self.remove_entry(txid).map(|entry| entry.tx)
    }

    /// Internal: remove an entry and clean up all indices.
    fn remove_entry(&mut self, txid: &Hash256) -> Option<OrphanEntry> {
        let entry = self.entries.remove(txid)?;
        for outpoint in &entry.missing {
            if let Some(waiters) = self.by_outpoint.get_mut(outpoint) {
                waiters.remove(txid);
                if waiters.is_empty() {
                    self.by_outpoint.remove(outpoint);
                }
            }
        }
        self.order.remove(&entry.seq);
        Some(entry)
    }

    /// Whether a txid is parked.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// Number of parked orphans.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no orphans are parked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
