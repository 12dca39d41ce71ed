//! # beck-verify
//! Script/witness verification for the Beck transaction pool.
//!
//! The admission pipeline treats verification as a black box with a
//! three-way observable contract: a job either verifies, fails for an
//! identity-determined reason, or fails for a witness-dependent (malleated)
//! reason. The pool uses the third case only to suppress negative caching.
//!
//! [`Ed25519Engine`] is the reference implementation of that contract.
//! [`WorkerPool`] runs any engine behind a byte-oriented job channel so the
//! CPU-heavy work happens off the pool's serialized path; [`InlineVerifier`]
//! runs it synchronously for tests and single-threaded embedders.

pub mod engine;
pub mod wire;
pub mod worker;

pub use engine::{Ed25519Engine, ScriptEngine, ScriptError, Verdict, VerifyJob};
pub use worker::{InlineVerifier, TxVerifier, VerifierError, WorkerPool, WorkerPoolConfig};
