//! The verification contract and the reference Ed25519 engine.
//!
//! A [`Verdict`] distinguishes *invalid* from *invalid-and-malleated*. The
//! distinction exists for exactly one consumer: the pool's negative cache.
//! A malleated rejection depends on witness bytes that sit outside the
//! transaction identity hash — an attacker can alter them freely without
//! changing the txid, and a legitimately-fixed resubmission will reuse the
//! same txid. Caching such a rejection would poison an identity that may
//! still become valid, so the engine is the authority on the classification
//! and the pipeline's only job is to honor it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use beck_core::crypto;
use beck_core::error::CryptoError;
use beck_core::traits::ScriptFlags;
use beck_core::types::{Coin, LockingPredicate, Transaction};

/// One unit of verification work: a transaction, the coins its inputs
/// spend (in input order), and the script flags active at the tip.
///
/// A job is a pure function input — engines must not consult any state
/// beyond these fields, which is what makes verification safe to run in
/// parallel across many in-flight submissions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct VerifyJob {
    /// The transaction under verification.
    pub tx: Transaction,
    /// The coin spent by each input, in input order.
    pub input_coins: Vec<Coin>,
    /// Script rules active at the current tip.
    pub flags: ScriptFlags,
}

impl VerifyJob {
    /// Build a job from a transaction and its resolved input coins.
    pub fn new(tx: Transaction, input_coins: Vec<Coin>, flags: ScriptFlags) -> Self {
        Self {
            tx,
            input_coins,
            flags,
        }
    }
}

/// Why a script/witness check failed.
#[derive(
    Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum ScriptError {
    #[error("input {input} spends an unspendable output")]
    UnspendableCoin { input: usize },
    #[error("job carries {coins} coins for {inputs} inputs")]
    InputCoinMismatch { inputs: usize, coins: usize },
    #[error("input {input} requires a witness but carries none")]
    MissingWitness { input: usize },
    #[error("input {input} carries a witness but the predicate requires none")]
    UnexpectedWitness { input: usize },
    #[error("input {input} witness bytes are malformed")]
    MalformedWitness { input: usize },
    #[error("input {input} witness key does not hash to the committed key")]
    KeyHashMismatch { input: usize },
    #[error("input {input} signature does not verify")]
    BadSignature { input: usize },
}

/// Outcome of one verification job.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum Verdict {
    /// Every input's witness satisfies its coin's predicate.
    Valid,
    /// Failed for an identity-determined reason. Safe to cache.
    Invalid(ScriptError),
    /// Failed for a witness-dependent reason. Must never be cached.
    InvalidMalleated(ScriptError),
}

impl Verdict {
    /// Whether the job verified.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Whether the failure is malleation-classified.
    pub fn is_malleated(&self) -> bool {
        matches!(self, Self::InvalidMalleated(_))
    }
}

/// A pure script/witness verifier.
///
/// `execute` must be a function of the job alone, with no side effects, so
/// implementations can run inline, on worker tasks, or in separate
/// processes interchangeably.
pub trait ScriptEngine: Send + Sync {
    /// Verify every input of the job's transaction against its coin.
    fn execute(&self, job: &VerifyJob) -> Verdict;
}

/// Reference engine: Ed25519 witnesses over key-hash predicates.
///
/// Classification rules:
/// - spending an [`LockingPredicate::Unspendable`] coin, or a malformed job
///   shape, is identity-determined → [`Verdict::Invalid`];
/// - everything decided by witness bytes (missing, stray, malformed, wrong
///   key, bad signature) → [`Verdict::InvalidMalleated`]. A stripped witness
///   on a key-locked coin is malleated because the identity is ambiguous:
///   the same txid with the witness restored may verify.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Engine;

impl Ed25519Engine {
    /// Create the reference engine.
    pub fn new() -> Self {
        Self
    }

    fn check_input(job: &VerifyJob, input: usize) -> Result<(), Verdict> {
        let coin = &job.input_coins[input];

        match &coin.lock {
            LockingPredicate::Unspendable => Err(Verdict::Invalid(
                ScriptError::UnspendableCoin { input },
            )),
            LockingPredicate::Open => {
                let has_witness = job.tx.inputs[input].witness.is_some();
                if has_witness && job.flags.contains(ScriptFlags::STRICT_WITNESS) {
                    Err(Verdict::InvalidMalleated(ScriptError::UnexpectedWitness {
                        input,
                    }))
                } else {
                    Ok(())
                }
            }
            LockingPredicate::KeyHash(expected) => {
                crypto::verify_input(&job.tx, input, expected).map_err(|e| {
                    let script_err = match e {
                        CryptoError::MissingWitness(_) => ScriptError::MissingWitness { input },
                        CryptoError::InvalidPublicKey | CryptoError::InvalidSignature => {
                            ScriptError::MalformedWitness { input }
                        }
                        CryptoError::KeyHashMismatch => ScriptError::KeyHashMismatch { input },
                        CryptoError::VerificationFailed
                        | CryptoError::InputIndexOutOfBounds { .. } => {
                            ScriptError::BadSignature { input }
                        }
                    };
                    Verdict::InvalidMalleated(script_err)
                })
            }
        }
    }
}

impl ScriptEngine for Ed25519Engine {
    fn execute(&self, job: &VerifyJob) -> Verdict {
        if job.tx.inputs.len() != job.input_coins.len() {
            return Verdict::Invalid(ScriptError::InputCoinMismatch {
                inputs: job.tx.inputs.len(),
                coins: job.input_coins.len(),
            });
        }

        for input in 0..job.tx.inputs.len() {
            if let Err(verdict) = Self::check_input(job, input) {
                return verdict;
            }
        }

        Verdict::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beck_core::crypto::KeyPair;
    use beck_core::types::{Hash256, OutPoint, Provenance, TxInput, TxOutput, Witness};

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn coin(lock: LockingPredicate) -> Coin {
        Coin {
            value: 10_000,
            lock,
            height: 1,
            is_coinbase: false,
            provenance: Provenance::Confirmed,
        }
    }

    fn unsigned_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([0x11; 32]),
                    index: 0,
                },
                witness: None,
            }],
            outputs: vec![TxOutput {
                value: 9_000,
                lock: LockingPredicate::Open,
            }],
            lock_time: 0,
        }
    }

    fn signed_tx(kp: &KeyPair) -> Transaction {
        let mut tx = unsigned_tx();
        crypto::sign_input(&mut tx, 0, kp).unwrap();
        tx
    }

    fn engine() -> Ed25519Engine {
        Ed25519Engine::new()
    }

    // ------------------------------------------------------------------
    // Valid paths
    // ------------------------------------------------------------------

    #[test]
    fn valid_signed_spend_of_key_hash() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let tx = signed_tx(&kp);
        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::KeyHash(kp.public_key().key_hash()))],
            ScriptFlags::default(),
        );
        assert_eq!(engine().execute(&job), Verdict::Valid);
    }

    #[test]
    fn valid_bare_spend_of_open_coin() {
        let job = VerifyJob::new(
            unsigned_tx(),
            vec![coin(LockingPredicate::Open)],
            ScriptFlags::default(),
        );
        assert_eq!(engine().execute(&job), Verdict::Valid);
    }

    // ------------------------------------------------------------------
    // Identity-determined rejections (plain Invalid)
    // ------------------------------------------------------------------

    #[test]
    fn unspendable_coin_is_invalid_not_malleated() {
        let job = VerifyJob::new(
            unsigned_tx(),
            vec![coin(LockingPredicate::Unspendable)],
            ScriptFlags::default(),
        );
        let verdict = engine().execute(&job);
        assert_eq!(
            verdict,
            Verdict::Invalid(ScriptError::UnspendableCoin { input: 0 })
        );
        assert!(!verdict.is_malleated());
    }

    #[test]
    fn coin_count_mismatch_is_invalid() {
        let job = VerifyJob::new(unsigned_tx(), vec![], ScriptFlags::default());
        assert_eq!(
            engine().execute(&job),
            Verdict::Invalid(ScriptError::InputCoinMismatch { inputs: 1, coins: 0 })
        );
    }

    // ------------------------------------------------------------------
    // Witness-dependent rejections (malleated)
    // ------------------------------------------------------------------

    #[test]
    fn stripped_witness_is_malleated() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let mut tx = signed_tx(&kp);
        tx.inputs[0].witness = None;

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::KeyHash(kp.public_key().key_hash()))],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::MissingWitness { input: 0 })
        );
    }

    #[test]
    fn stray_witness_on_open_coin_is_malleated() {
        let mut tx = unsigned_tx();
        tx.inputs[0].witness = Some(Witness {
            signature: vec![0u8; 64],
            public_key: vec![0u8; 32],
        });

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::Open)],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::UnexpectedWitness { input: 0 })
        );
    }

    #[test]
    fn stray_witness_tolerated_without_strict_flag() {
        let mut tx = unsigned_tx();
        tx.inputs[0].witness = Some(Witness {
            signature: vec![0u8; 64],
            public_key: vec![0u8; 32],
        });

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::Open)],
            ScriptFlags::ENFORCE_LOCKTIME,
        );
        assert_eq!(engine().execute(&job), Verdict::Valid);
    }

    #[test]
    fn altered_signature_bytes_are_malleated() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let mut tx = signed_tx(&kp);
        tx.inputs[0].witness.as_mut().unwrap().signature[10] ^= 0xFF;

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::KeyHash(kp.public_key().key_hash()))],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::BadSignature { input: 0 })
        );
    }

    #[test]
    fn wrong_key_is_malleated() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let other = KeyPair::from_secret_bytes([2u8; 32]);
        let tx = signed_tx(&kp);

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::KeyHash(
                other.public_key().key_hash(),
            ))],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::KeyHashMismatch { input: 0 })
        );
    }

    #[test]
    fn truncated_witness_is_malleated() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let mut tx = signed_tx(&kp);
        tx.inputs[0].witness.as_mut().unwrap().signature.truncate(10);

        let job = VerifyJob::new(
            tx,
            vec![coin(LockingPredicate::KeyHash(kp.public_key().key_hash()))],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::MalformedWitness { input: 0 })
        );
    }

    // ------------------------------------------------------------------
    // Multi-input
    // ------------------------------------------------------------------

    #[test]
    fn second_bad_input_fails_whole_job() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let key_hash = kp.public_key().key_hash();

        let mut tx = unsigned_tx();
        tx.inputs.push(TxInput {
            previous_output: OutPoint {
                txid: Hash256([0x22; 32]),
                index: 0,
            },
            witness: None,
        });
        crypto::sign_input(&mut tx, 0, &kp).unwrap();
        // Input 1 left unsigned against a key-locked coin.

        let job = VerifyJob::new(
            tx,
            vec![
                coin(LockingPredicate::KeyHash(key_hash)),
                coin(LockingPredicate::KeyHash(key_hash)),
            ],
            ScriptFlags::default(),
        );
        assert_eq!(
            engine().execute(&job),
            Verdict::InvalidMalleated(ScriptError::MissingWitness { input: 1 })
        );
    }
}
