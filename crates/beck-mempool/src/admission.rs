//! The admission pipeline.
//!
//! [`Mempool::submit`] drives one transaction through the state machine:
//! pre-check against the pool and the reject filter, structural and policy
//! checks, conflict detection, coin resolution (absent inputs park the
//! transaction as an orphan), the locktime gate, value checks, script
//! verification, and finally commit plus orphan cascade.
//!
//! Concurrency model: a single `Mutex<PoolState>` serializes every
//! pool-mutating step. Script verification — the expensive step — runs with
//! the lock released, through the [`TxVerifier`] seam; the verdict rejoins
//! the serialized section, where duplicate/conflict/coin checks are re-run
//! against current state before anything is committed. Two submissions
//! racing on the same outpoint therefore commit in verdict-rejoin order,
//! and the loser is rejected deterministically at its own commit step.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use beck_core::constants::{LOCKTIME_TIME_THRESHOLD, MAX_CASCADE_DEPTH, MIN_TX_FEE};
use beck_core::error::TxError;
use beck_core::traits::{ChainView, ScriptFlags};
use beck_core::types::{Coin, Hash256, OutPoint, Transaction};
use beck_core::validation;
use beck_verify::engine::{Verdict, VerifyJob};
use beck_verify::worker::{TxVerifier, VerifierError};

use crate::config::PoolConfig;
use crate::error::{CacheScope, PolicyError, RejectReason};
use crate::events::PoolEvent;
use crate::pool::{MempoolEntry, PoolState};

/// Event channel capacity; slow subscribers observe lag, never block the pool.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Committed into the pool.
    Admitted { txid: Hash256, fee: u64 },
    /// Parked: one or more referenced outpoints are unresolved. Not an
    /// error and never cached — unresolved is not invalid.
    Orphaned {
        txid: Hash256,
        missing: Vec<OutPoint>,
    },
    /// Rejected with a classified reason.
    Rejected {
        txid: Hash256,
        reason: RejectReason,
    },
}

impl AdmissionOutcome {
    /// Whether the transaction reached the pool.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    /// The rejection reason, if the submission was rejected.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Everything resolved under the lock before verification.
struct Prepared {
    txid: Hash256,
    wtxid: Hash256,
    size: usize,
    fee: u64,
    coins: Vec<(OutPoint, Coin)>,
    flags: ScriptFlags,
    height: u64,
}

/// The unconfirmed-transaction pool.
pub struct Mempool {
    pub(crate) state: Mutex<PoolState>,
    pub(crate) chain: Arc<dyn ChainView>,
    verifier: Arc<dyn TxVerifier>,
    pub(crate) events: broadcast::Sender<PoolEvent>,
    config: PoolConfig,
}

impl Mempool {
    /// Create a pool over the given chain authority and verifier.
    pub fn new(
        chain: Arc<dyn ChainView>,
        verifier: Arc<dyn TxVerifier>,
        config: PoolConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Mutex::new(PoolState::new(Arc::clone(&chain), &config));
        Self {
            state,
            chain,
            verifier,
            events,
            config,
        }
    }

    /// Subscribe to pool notifications. Delivery order matches commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    /// Submit one transaction, then re-attempt any orphans its admission
    /// (or the admissions it triggers) unparks.
    pub async fn submit(&self, tx: Transaction) -> AdmissionOutcome {
        let (outcome, released) = self.admit(tx, false).await;
        self.drain_cascade(released).await;
        outcome
    }

    /// Run the pipeline for one transaction. Returns the outcome plus any
    /// orphans released by a successful commit (the caller cascades them).
    ///
    /// `skip_structural` is the reorg re-admission path: structure was
    /// already known good when the transaction was first accepted.
    pub(crate) async fn admit(
        &self,
        tx: Transaction,
        skip_structural: bool,
    ) -> (AdmissionOutcome, Vec<Transaction>) {
        let prepared = {
            let mut state = self.state.lock();
            match self.prepare(&mut state, &tx, skip_structural) {
                Ok(prepared) => prepared,
                Err(outcome) => return (outcome, Vec::new()),
            }
        };

        // Suspension point: the pool lock is not held while the verifier
        // runs, so verification parallelizes across in-flight submissions.
        let job = VerifyJob::new(
            tx.clone(),
            prepared.coins.iter().map(|(_, coin)| coin.clone()).collect(),
            prepared.flags,
        );
        let verdict = self.verifier.verify(job).await;

        let mut state = self.state.lock();
        self.commit(&mut state, tx, prepared, verdict)
    }

    /// Re-attempt released orphans breadth-first, bounded by
    /// [`MAX_CASCADE_DEPTH`] per originating submission.
    pub(crate) async fn drain_cascade(&self, released: Vec<Transaction>) {
        let mut queue: VecDeque<Transaction> = released.into();
        let mut processed = 0usize;

        while let Some(tx) = queue.pop_front() {
            if processed >= MAX_CASCADE_DEPTH {
                warn!(
                    dropped = queue.len() + 1,
                    "cascade bound reached; remaining orphan candidates dropped"
                );
                break;
            }
            processed += 1;

            let (outcome, more) = self.admit(tx, false).await;
            trace!(?outcome, "orphan re-admission");
            queue.extend(more);
        }
    }

    /// Steps 1–5: everything that runs under the lock before verification.
    fn prepare(
        &self,
        state: &mut PoolState,
        tx: &Transaction,
        skip_structural: bool,
    ) -> Result<Prepared, AdmissionOutcome> {
        let txid = tx.txid();

        // Step 1: pre-check.
        if state.entries.contains_key(&txid) {
            return Err(AdmissionOutcome::Rejected {
                txid,
                reason: RejectReason::DuplicateHash,
            });
        }
        if state.rejects.contains(&txid) {
            trace!(%txid, "short-circuiting cached rejection");
            return Err(AdmissionOutcome::Rejected {
                txid,
                reason: RejectReason::KnownInvalid,
            });
        }

        // Step 2: structural/policy checks.
        if !skip_structural {
            if tx.is_coinbase() {
                let reason: RejectReason =
                    PolicyError::from(TxError::InvalidCoinbase("cannot relay a coinbase".into()))
                        .into();
                return Err(self.reject(state, txid, reason));
            }
            if let Err(e) = validation::validate_structure(tx) {
                return Err(self.reject(state, txid, PolicyError::from(e).into()));
            }
        }

        // Step 2b: conflicts against the spent-outpoint index.
        for input in &tx.inputs {
            if let Some(existing) = state.coins.spender_of(&input.previous_output) {
                let reason = RejectReason::Conflict {
                    existing,
                    outpoint: input.previous_output.clone(),
                };
                return Err(self.reject(state, txid, reason));
            }
        }

        // Step 3: coin resolution. Absent inputs park the transaction;
        // unresolved is not invalid, so nothing is cached.
        let (coins, missing) = resolve_coins(state, tx);
        if !missing.is_empty() {
            state.orphans.park(tx.clone(), missing.clone());
            debug!(%txid, missing = missing.len(), "parked orphan");
            let _ = self.events.send(PoolEvent::OrphanParked {
                txid,
                missing: missing.clone(),
            });
            return Err(AdmissionOutcome::Orphaned { txid, missing });
        }

        // Step 4: locktime gate and coinbase maturity. Lock times at or
        // above the threshold are Unix timestamps, below it block heights.
        let height = self.chain.height();
        let flags = self.chain.script_flags();
        if flags.contains(ScriptFlags::ENFORCE_LOCKTIME) && tx.lock_time > 0 {
            let current = if tx.lock_time >= LOCKTIME_TIME_THRESHOLD {
                self.chain.time()
            } else {
                height
            };
            if current < tx.lock_time {
                let reason = RejectReason::PrematureLocktime {
                    lock_time: tx.lock_time,
                    current,
                };
                return Err(self.reject(state, txid, reason));
            }
        }
        for (input, (_, coin)) in coins.iter().enumerate() {
            if !coin.is_mature(height) {
                return Err(self.reject(state, txid, PolicyError::ImmatureCoinbase { input }.into()));
            }
        }

        // Step 5: value checks and fee floor.
        let total_input = match coins
            .iter()
            .try_fold(0u64, |acc, (_, coin)| acc.checked_add(coin.value))
        {
            Some(total) => total,
            None => {
                return Err(self.reject(state, txid, PolicyError::from(TxError::ValueOverflow).into()))
            }
        };
        let Some(total_output) = tx.total_output_value() else {
            return Err(self.reject(state, txid, PolicyError::from(TxError::ValueOverflow).into()));
        };
        if total_input < total_output {
            let reason = RejectReason::InsufficientFunds {
                inputs: total_input,
                outputs: total_output,
            };
            return Err(self.reject(state, txid, reason));
        }
        let fee = total_input - total_output;
        if fee < MIN_TX_FEE {
            let reason: RejectReason = PolicyError::FeeTooLow {
                fee,
                minimum: MIN_TX_FEE,
            }
            .into();
            return Err(self.reject(state, txid, reason));
        }

        let size = match tx.encode() {
            Ok(encoded) => encoded.len(),
            Err(e) => return Err(self.reject(state, txid, PolicyError::from(e).into())),
        };
        if state.entries.len() + 1 > self.config.max_count
            || state.total_bytes + size > self.config.max_bytes
        {
            return Err(self.reject(state, txid, PolicyError::PoolFull.into()));
        }

        let wtxid = match tx.wtxid() {
            Ok(wtxid) => wtxid,
            Err(e) => return Err(self.reject(state, txid, PolicyError::from(e).into())),
        };

        Ok(Prepared {
            txid,
            wtxid,
            size,
            fee,
            coins,
            flags,
            height,
        })
    }

    /// Steps 6–8: classify the verdict, re-check against current state, and
    /// commit. Returns released orphans for the caller to cascade.
    fn commit(
        &self,
        state: &mut PoolState,
        tx: Transaction,
        prepared: Prepared,
        verdict: Result<Verdict, VerifierError>,
    ) -> (AdmissionOutcome, Vec<Transaction>) {
        let txid = prepared.txid;

        match verdict {
            Err(e) => {
                // A crashed or unresponsive verification is not evidence of
                // malleation; it is cached like any deterministic failure,
                // tip-scoped so the next block event retries it.
                let reason = RejectReason::VerifierUnavailable(e.to_string());
                (self.reject(state, txid, reason), Vec::new())
            }
            Ok(Verdict::Invalid(e)) => {
                (self.reject(state, txid, RejectReason::ScriptInvalid(e)), Vec::new())
            }
            Ok(Verdict::InvalidMalleated(e)) => {
                debug!(%txid, error = %e, "rejecting malleated transaction without caching");
                let outcome = AdmissionOutcome::Rejected {
                    txid,
                    reason: RejectReason::ScriptInvalidMalleated(e),
                };
                (outcome, Vec::new())
            }
            Ok(Verdict::Valid) => self.commit_valid(state, tx, prepared),
        }
    }

    /// Step 7 proper: the state may have moved while the verifier ran, so
    /// duplicate, conflict, coin, and capacity checks are re-run against
    /// current state before mutating anything.
    fn commit_valid(
        &self,
        state: &mut PoolState,
        tx: Transaction,
        prepared: Prepared,
    ) -> (AdmissionOutcome, Vec<Transaction>) {
        let txid = prepared.txid;

        if state.entries.contains_key(&txid) {
            return (
                AdmissionOutcome::Rejected {
                    txid,
                    reason: RejectReason::DuplicateHash,
                },
                Vec::new(),
            );
        }
        for input in &tx.inputs {
            if let Some(existing) = state.coins.spender_of(&input.previous_output) {
                let reason = RejectReason::Conflict {
                    existing,
                    outpoint: input.previous_output.clone(),
                };
                return (self.reject(state, txid, reason), Vec::new());
            }
        }

        let (coins, missing) = resolve_coins(state, &tx);
        if !missing.is_empty() {
            // A parent was evicted while we verified; park rather than fail.
            state.orphans.park(tx.clone(), missing.clone());
            let _ = self.events.send(PoolEvent::OrphanParked {
                txid,
                missing: missing.clone(),
            });
            return (AdmissionOutcome::Orphaned { txid, missing }, Vec::new());
        }

        if state.entries.len() + 1 > self.config.max_count
            || state.total_bytes + prepared.size > self.config.max_bytes
        {
            return (
                self.reject(state, txid, PolicyError::PoolFull.into()),
                Vec::new(),
            );
        }

        let fee = prepared.fee;
        state.insert_entry(
            tx.clone(),
            txid,
            prepared.wtxid,
            fee,
            prepared.size,
            coins,
            prepared.height,
        );
        debug!(%txid, fee, size = prepared.size, "admitted transaction");
        let _ = self.events.send(PoolEvent::TransactionAdded {
            txid,
            fee,
            size: prepared.size,
        });

        let mut released = Vec::new();
        for outpoint in tx.created_outpoints() {
            released.extend(state.orphans.resolve(&outpoint));
        }

        (AdmissionOutcome::Admitted { txid, fee }, released)
    }

    /// Record a cacheable rejection and build the outcome.
    fn reject(
        &self,
        state: &mut PoolState,
        txid: Hash256,
        reason: RejectReason,
    ) -> AdmissionOutcome {
        if reason.cache_scope() != CacheScope::Never {
            state.rejects.insert(txid, reason.clone());
        }
        debug!(%txid, %reason, "rejected transaction");
        AdmissionOutcome::Rejected { txid, reason }
    }

    // ------------------------------------------------------------------
    // Query surface
    // ------------------------------------------------------------------

    /// Get a pooled entry by txid.
    pub fn get(&self, txid: &Hash256) -> Option<MempoolEntry> {
        self.state.lock().entries.get(txid).cloned()
    }

    /// Whether a txid is pooled.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.state.lock().entries.contains_key(txid)
    }

    /// Whether a txid is recorded in the negative cache.
    pub fn has_reject(&self, txid: &Hash256) -> bool {
        self.state.lock().rejects.contains(txid)
    }

    /// The cached rejection reason for a txid, if any.
    pub fn reject_reason(&self, txid: &Hash256) -> Option<RejectReason> {
        self.state.lock().rejects.get(txid).cloned()
    }

    /// Sum of pooled spendable coin values paying any watched key hash.
    pub fn balance(&self, watched: &HashSet<Hash256>) -> u64 {
        self.state.lock().balance(watched)
    }

    /// Pooled transactions in insertion order.
    pub fn history(&self) -> Vec<Transaction> {
        self.state.lock().history()
    }

    /// A coin as the pool currently sees it (overlay plus chain).
    pub fn spendable_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.state.lock().coins.spendable_coin(outpoint)
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Total serialized bytes of pooled transactions.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    /// Total fees of pooled transactions.
    pub fn total_fees(&self) -> u64 {
        self.state.lock().total_fees()
    }

    /// Number of parked orphans.
    pub fn orphan_count(&self) -> usize {
        self.state.lock().orphans.len()
    }
}

/// Resolve each input's coin through the overlay, splitting resolved coins
/// from missing outpoints.
fn resolve_coins(
    state: &PoolState,
    tx: &Transaction,
) -> (Vec<(OutPoint, Coin)>, Vec<OutPoint>) {
    let mut coins = Vec::with_capacity(tx.inputs.len());
    let mut missing = Vec::new();
    for input in &tx.inputs {
        match state.coins.spendable_coin(&input.previous_output) {
            Some(coin) => coins.push((input.previous_output.clone(), coin)),
            None => missing.push(input.previous_output.clone()),
        }
    }
    (coins, missing)
}
