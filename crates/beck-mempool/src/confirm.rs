//! Confirmation and reorg handling.
//!
//! [`Mempool::connect_block`] is called after the chain authority has
//! connected a block: confirmed transactions leave the pool (their coins
//! now belong to the chain), double-spend losers and their in-pool
//! descendants are rolled back, stale negative-cache entries are cleared,
//! and orphans freed by the block's outputs are replayed through admission.
//!
//! [`Mempool::disconnect_block`] is the reverse, called after the chain
//! authority has rolled back to the parent tip: the block's transactions
//! are reinstated through admission starting at the locktime step —
//! structure was already known good — and the reject filter fully resets if
//! the active script flags changed across the boundary.

use tracing::{debug, info};

use beck_core::types::{Block, Hash256};

use crate::admission::Mempool;
use crate::error::CoinViewError;
use crate::events::{PoolEvent, RemovalReason};
use crate::pool::PoolState;

/// What applying a block did to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Pooled transactions removed because the block confirmed them.
    pub mined: usize,
    /// Pooled transactions evicted as double-spend losers (descendants
    /// included).
    pub evicted: usize,
    /// Orphans freed by the block's outputs and re-attempted.
    pub replayed: usize,
}

impl Mempool {
    /// Apply a newly connected block to the pool.
    ///
    /// The chain authority must already reflect the block (height, coins)
    /// when this is called. Errors indicate coin-view corruption and must
    /// abort the caller's block processing loudly.
    pub async fn connect_block(&self, block: &Block) -> Result<BlockSummary, CoinViewError> {
        let (mined, evicted, freed) = {
            let mut state = self.state.lock();

            // Confirmed transactions leave the pool without undo; the chain
            // is authoritative for their coins now. Their negative-cache
            // entries are cleared so a previously-rejected-then-superseded
            // identity is not permanently blacklisted.
            let mut mined = 0;
            for tx in &block.transactions {
                let txid = tx.txid();
                if state.remove_confirmed_entry(&txid).is_some() {
                    mined += 1;
                    let _ = self.events.send(PoolEvent::TransactionRemoved {
                        txid,
                        reason: RemovalReason::Mined,
                    });
                }
                state.orphans.evict(&txid);
                state.rejects.remove(&txid);
            }

            // Pool entries spending inputs the block consumed lost the
            // double-spend race; roll them back, descendants first.
            let mut evicted = 0;
            for tx in &block.transactions {
                for input in &tx.inputs {
                    if input.previous_output.is_null() {
                        continue;
                    }
                    if let Some(spender) = state.coins.spender_of(&input.previous_output) {
                        if state.entries.contains_key(&spender) {
                            evicted += self.evict_with_descendants(&mut state, spender)?;
                        }
                    }
                }
            }

            // A new tip can change tip-scoped outcomes (conflicts,
            // locktimes); drop them wholesale.
            state.rejects.clear_tip();
            state.pinned_flags = self.chain.script_flags();

            // Outputs created by the block may unblock parked orphans.
            let mut freed = Vec::new();
            for tx in &block.transactions {
                for outpoint in tx.created_outpoints() {
                    freed.extend(state.orphans.resolve(&outpoint));
                }
            }

            let height = self.chain.height();
            info!(
                hash = %block.header.hash(),
                height,
                mined,
                evicted,
                freed = freed.len(),
                "applied block to pool"
            );
            let _ = self.events.send(PoolEvent::BlockProcessed {
                hash: block.header.hash(),
                height,
                mined,
                evicted,
            });

            (mined, evicted, freed)
        };

        // Replay freed orphans through the full pipeline; each may cascade
        // further.
        let replayed = freed.len();
        for tx in freed {
            let (_, more) = self.admit(tx, false).await;
            self.drain_cascade(more).await;
        }

        Ok(BlockSummary {
            mined,
            evicted,
            replayed,
        })
    }

    /// Reverse a disconnected block (reorg).
    ///
    /// The chain authority must already be rolled back to the parent tip.
    /// Returns the number of transactions reinstated into the pool.
    pub async fn disconnect_block(&self, block: &Block) -> Result<usize, CoinViewError> {
        {
            let mut state = self.state.lock();

            // A rule activation boundary invalidates every cached verdict.
            let flags = self.chain.script_flags();
            if flags != state.pinned_flags {
                debug!("script flags changed across reorg; resetting reject filter");
                state.rejects.reset();
            } else {
                state.rejects.clear_tip();
            }
            state.pinned_flags = flags;

            // The disconnected coinbase no longer exists anywhere; pool
            // entries spending its outputs are unfundable.
            if let Some(coinbase) = block.coinbase() {
                for outpoint in coinbase.created_outpoints() {
                    if let Some(spender) = state.coins.spender_of(&outpoint) {
                        if state.entries.contains_key(&spender) {
                            self.evict_with_descendants(&mut state, spender)?;
                        }
                    }
                }
            }
        }

        // Reinstate in block order so parents precede children. Structure
        // was validated when the block was first accepted; admission re-runs
        // from the locktime step onward against the rolled-back tip.
        let mut reinstated = 0;
        for tx in block.transactions.iter().skip(1) {
            let (outcome, more) = self.admit(tx.clone(), true).await;
            if outcome.is_admitted() {
                reinstated += 1;
            }
            self.drain_cascade(more).await;
        }

        Ok(reinstated)
    }

    /// Evict a pooled transaction and every in-pool descendant, children
    /// first so each undo finds its created coins unspent.
    fn evict_with_descendants(
        &self,
        state: &mut PoolState,
        root: Hash256,
    ) -> Result<usize, CoinViewError> {
        // Collect the descendant closure.
        let mut doomed = std::collections::HashSet::new();
        let mut stack = vec![root];
        while let Some(txid) = stack.pop() {
            if !doomed.insert(txid) {
                continue;
            }
            stack.extend(state.direct_dependents(&txid));
        }

        // Peel leaves: every member's dependents are also members, so a
        // member with no pooled dependents is always available.
        let mut removed = 0;
        while !doomed.is_empty() {
            let leaf = doomed
                .iter()
                .copied()
                .find(|txid| state.direct_dependents(txid).is_empty());
            let Some(leaf) = leaf else {
                // Unreachable for a well-formed DAG; fail loudly if not.
                let txid = *doomed.iter().next().expect("non-empty doomed set");
                state.remove_entry_with_undo(&txid)?;
                unreachable!("dependency cycle in pool entries");
            };
            doomed.remove(&leaf);
            if state.remove_entry_with_undo(&leaf)?.is_some() {
                removed += 1;
                debug!(txid = %leaf, "evicted double-spend loser");
                let _ = self.events.send(PoolEvent::TransactionRemoved {
                    txid: leaf,
                    reason: RemovalReason::Conflict,
                });
            }
        }

        Ok(removed)
    }
}
