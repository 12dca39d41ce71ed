//! The unconfirmed coin-view overlay.
//!
//! Layers the outputs created by pooled transactions over the confirmed
//! chain's coin set, and tracks which outpoints pooled transactions have
//! spent. Reads fall through to the [`ChainView`] when an outpoint is
//! neither shadowed nor pool-created.
//!
//! Invariants:
//! - an outpoint is spendable by at most one pooled transaction; spending
//!   removes it from view and records the spender;
//! - after [`CoinViewOverlay::undo`], previously-shadowed confirmed coins
//!   are visible again.
//!
//! The overlay never calls the verifier and has no side effects beyond its
//! own maps.

use std::collections::HashMap;
use std::sync::Arc;

use beck_core::traits::ChainView;
use beck_core::types::{Coin, Hash256, OutPoint, Provenance, Transaction};

use crate::error::CoinViewError;

/// In-memory index of outputs spendable by pooled transactions.
pub struct CoinViewOverlay {
    chain: Arc<dyn ChainView>,
    /// Unspent coins created by pooled transactions.
    unconfirmed: HashMap<OutPoint, Coin>,
    /// Outpoint → txid of the pooled transaction spending it.
    spent: HashMap<OutPoint, Hash256>,
}

impl CoinViewOverlay {
    /// Create an empty overlay over the given chain view.
    pub fn new(chain: Arc<dyn ChainView>) -> Self {
        Self {
            chain,
            unconfirmed: HashMap::new(),
            spent: HashMap::new(),
        }
    }

    /// Look up a coin that is still spendable: not consumed by any pooled
    /// transaction, found in the unconfirmed overlay or the confirmed chain.
    pub fn spendable_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        if self.spent.contains_key(outpoint) {
            return None;
        }
        if let Some(coin) = self.unconfirmed.get(outpoint) {
            return Some(coin.clone());
        }
        self.chain.coin(outpoint)
    }

    /// The pooled transaction spending this outpoint, if any.
    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<Hash256> {
        self.spent.get(outpoint).copied()
    }

    /// Apply an admitted transaction: mark each input's outpoint spent and
    /// register each output as a new unconfirmed coin at `height`.
    pub fn apply(&mut self, tx: &Transaction, txid: Hash256, height: u64) {
        for input in &tx.inputs {
            self.unconfirmed.remove(&input.previous_output);
            self.spent.insert(input.previous_output.clone(), txid);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint {
                txid,
                index: index as u64,
            };
            self.unconfirmed.insert(
                outpoint,
                Coin {
                    value: output.value,
                    lock: output.lock.clone(),
                    height,
                    is_coinbase: false,
                    provenance: Provenance::Unconfirmed,
                },
            );
        }
    }

    /// Reverse [`apply`](Self::apply) for a removed transaction.
    ///
    /// Retires the transaction's created coins and releases its inputs,
    /// restoring consumed pool coins from the `spent_coins` snapshot (unless
    /// the chain has since confirmed an identical coin). Errors indicate
    /// pool corruption: a created coin still spent by a dependent means the
    /// caller failed to remove dependents first.
    pub fn undo(
        &mut self,
        tx: &Transaction,
        txid: Hash256,
        spent_coins: &[(OutPoint, Coin)],
    ) -> Result<(), CoinViewError> {
        let created = tx.created_outpoints();

        // Validate before mutating so a corruption error leaves the
        // overlay untouched.
        for outpoint in &created {
            if let Some(spender) = self.spent.get(outpoint) {
                return Err(CoinViewError::StillSpent {
                    txid,
                    outpoint: outpoint.clone(),
                    spender: *spender,
                });
            }
            if !self.unconfirmed.contains_key(outpoint) {
                return Err(CoinViewError::MissingCreatedCoin {
                    txid,
                    outpoint: outpoint.clone(),
                });
            }
        }

        for outpoint in &created {
            self.unconfirmed.remove(outpoint);
        }
        for (outpoint, coin) in spent_coins {
            self.spent.remove(outpoint);
            if coin.provenance == Provenance::Unconfirmed && self.chain.coin(outpoint).is_none() {
                self.unconfirmed.insert(outpoint.clone(), coin.clone());
            }
        }

        Ok(())
    }

    /// Forget a confirmed transaction without undoing it.
    ///
    /// Its created coins now belong to the confirmed set (reads fall
    /// through), its spent markers are released, and pool coins it consumed
    /// stay consumed for good. Markers held by other pooled spenders on its
    /// outputs are left untouched.
    pub fn remove_confirmed(&mut self, tx: &Transaction, txid: Hash256) {
        for input in &tx.inputs {
            if self.spent.get(&input.previous_output) == Some(&txid) {
                self.spent.remove(&input.previous_output);
            }
        }
        for outpoint in tx.created_outpoints() {
            self.unconfirmed.remove(&outpoint);
        }
    }

    /// Iterate over unspent unconfirmed coins.
    pub fn unconfirmed_coins(&self) -> impl Iterator<Item = (&OutPoint, &Coin)> {
        self.unconfirmed.iter()
    }

    /// Number of unspent unconfirmed coins.
    pub fn unconfirmed_count(&self) -> usize {
        self.unconfirmed.len()
    }

    /// Number of outpoints currently spent by pooled transactions.
    pub fn spent_count(&self) -> usize {
        self.spent.len()
    }
}
