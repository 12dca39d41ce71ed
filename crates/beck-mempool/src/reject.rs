//! The negative cache (reject filter).
//!
//! Re-verifying scripts is expensive, and adversarial relay loves
//! resubmitting the same invalid bytes. The filter remembers txids that
//! failed admission for identity-determined reasons so the pipeline can
//! short-circuit at its pre-check without touching the verifier.
//!
//! Two scopes keep stale negatives from outliving their meaning: *tip*
//! entries are dropped on every block event (a new tip can change the
//! outcome of a conflict or a premature locktime), *chain* entries persist
//! until the txid is confirmed or a reorg resets the filter. Malleation-
//! classified rejections are never recorded at all — witness bytes are
//! outside the identity hash, so caching them would let an attacker poison
//! a txid that a legitimately-fixed transaction might later reuse.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use beck_core::types::Hash256;

use crate::error::{CacheScope, RejectReason};

/// Record of transaction hashes known to fail admission.
pub struct RejectFilter {
    entries: HashMap<Hash256, (RejectReason, CacheScope)>,
    /// Insertion order for FIFO trimming. May contain stale txids already
    /// removed from `entries`; trimming skips them.
    order: VecDeque<Hash256>,
    max_entries: usize,
}

impl RejectFilter {
    /// Create a filter holding at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    /// Record a rejection.
    ///
    /// Reasons whose [`CacheScope`] is [`CacheScope::Never`] — malleation-
    /// classified failures, missing inputs, witness-sensitive or transient
    /// conditions — are silently ignored (debug-asserted, since the caller
    /// is not supposed to offer them).
    pub fn insert(&mut self, txid: Hash256, reason: RejectReason) {
        let scope = reason.cache_scope();
        debug_assert!(
            scope != CacheScope::Never,
            "uncacheable rejection offered to the filter: {reason}"
        );
        if scope == CacheScope::Never {
            return;
        }

        while self.entries.len() >= self.max_entries {
            match self.order.pop_front() {
                Some(stale) => {
                    self.entries.remove(&stale);
                }
                None => break,
            }
        }

        trace!(%txid, %reason, ?scope, "caching rejection");
        if self.entries.insert(txid, (reason, scope)).is_none() {
            self.order.push_back(txid);
        }
    }

    /// Whether this txid is recorded as known-invalid.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// The recorded rejection reason, if any.
    pub fn get(&self, txid: &Hash256) -> Option<&RejectReason> {
        self.entries.get(txid).map(|(reason, _)| reason)
    }

    /// Clear one txid: called when the transaction is confirmed or
    /// otherwise known good, so a superseded identity is not permanently
    /// blacklisted.
    pub fn remove(&mut self, txid: &Hash256) -> bool {
        self.entries.remove(txid).is_some()
    }

    /// Drop all tip-scoped entries. Called on every block connect and
    /// disconnect.
    pub fn clear_tip(&mut self) {
        self.entries.retain(|_, (_, scope)| *scope != CacheScope::Tip);
    }

    /// Full wipe: called at reorg boundaries where the active script flags
    /// changed, invalidating every cached verdict.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of recorded rejections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rejections are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
