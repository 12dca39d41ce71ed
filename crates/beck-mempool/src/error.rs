//! Rejection taxonomy and pool error types.
//!
//! Every terminal admission failure carries a [`RejectReason`]. The reason
//! determines two things the caller and the negative cache both depend on:
//! whether the rejection is malleation-classified (never cached, possibly
//! retried with different witness bytes), and for how long a cached
//! rejection stays valid ([`CacheScope`]).

use thiserror::Error;

use beck_core::error::TxError;
use beck_core::types::{Hash256, OutPoint};
use beck_verify::engine::ScriptError;

/// How long a cached rejection remains meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Never cached: the rejection depends on witness bytes or transient
    /// resource state, so the same identity may yet be admitted.
    Never,
    /// Valid only for the current tip; cleared on every block event.
    Tip,
    /// Valid while the chain grows; cleared by confirmation or a reorg reset.
    Chain,
}

/// Policy-level rejections: standardness, fees, and resource limits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("structural: {0}")] Structural(#[from] TxError),
    #[error("fee too low: {fee} < minimum {minimum}")] FeeTooLow { fee: u64, minimum: u64 },
    #[error("immature coinbase spend at input {input}")] ImmatureCoinbase { input: usize },
    #[error("pool full")] PoolFull,
}

/// Why a submission terminated without being admitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("transaction already in pool")]
    DuplicateHash,
    #[error("transaction hash is in the reject filter")]
    KnownInvalid,
    #[error("policy violation: {0}")]
    PolicyViolation(#[from] PolicyError),
    #[error("conflicts with pooled tx {existing} on outpoint {outpoint}")]
    Conflict { existing: Hash256, outpoint: OutPoint },
    #[error("lock time {lock_time} not reached at {current}")]
    PrematureLocktime { lock_time: u64, current: u64 },
    #[error("insufficient funds: inputs {inputs} < outputs {outputs}")]
    InsufficientFunds { inputs: u64, outputs: u64 },
    #[error("script invalid: {0}")]
    ScriptInvalid(ScriptError),
    #[error("script invalid (malleated): {0}")]
    ScriptInvalidMalleated(ScriptError),
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),
}

impl RejectReason {
    /// Whether the rejection is malleation-classified.
    ///
    /// Relay logic must not re-broadcast such a transaction, but must also
    /// never treat its identity as permanently poisoned: a resubmission with
    /// corrected witness bytes shares the same txid and may be valid.
    pub fn is_malleated(&self) -> bool {
        matches!(self, Self::ScriptInvalidMalleated(_))
    }

    /// The negative-cache scope this rejection may be recorded under.
    pub fn cache_scope(&self) -> CacheScope {
        match self {
            // Not new information, or witness/resource dependent.
            Self::DuplicateHash | Self::KnownInvalid | Self::ScriptInvalidMalleated(_) => {
                CacheScope::Never
            }
            Self::PolicyViolation(PolicyError::PoolFull) => CacheScope::Never,
            Self::PolicyViolation(PolicyError::Structural(e)) if e.is_witness_sensitive() => {
                CacheScope::Never
            }

            // A new tip can change these outcomes.
            Self::Conflict { .. }
            | Self::PrematureLocktime { .. }
            | Self::VerifierUnavailable(_)
            | Self::PolicyViolation(PolicyError::ImmatureCoinbase { .. }) => CacheScope::Tip,

            // Identity-determined while the chain grows.
            Self::InsufficientFunds { .. }
            | Self::ScriptInvalid(_)
            | Self::PolicyViolation(PolicyError::Structural(_))
            | Self::PolicyViolation(PolicyError::FeeTooLow { .. }) => CacheScope::Chain,
        }
    }
}

/// Coin-view invariant violations.
///
/// These indicate pool corruption, not bad input; the enclosing operation
/// must abort loudly rather than swallow them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinViewError {
    #[error("undo of {txid} found created coin {outpoint} missing from the overlay")]
    MissingCreatedCoin { txid: Hash256, outpoint: OutPoint },
    #[error("undo of {txid} found created coin {outpoint} still spent by {spender}")]
    StillSpent {
        txid: Hash256,
        outpoint: OutPoint,
        spender: Hash256,
    },
}
