//! Ed25519 cryptographic operations for the Beck protocol.
//!
//! Provides key generation, input signing, and signature verification.
//! Uses ed25519-dalek for the underlying Ed25519 implementation and BLAKE3
//! for key hashing and signing hashes.
//!
//! # Signing scheme
//!
//! Inputs are signed over a **sighash** derived from the transaction's
//! witness-stripped identity preimage plus the index of the input being
//! signed. Witness bytes are excluded, so signatures commit to exactly the
//! identity the pool keys on, inputs can be signed in any order, and
//! altering a signature can never change the txid.

use ed25519_dalek::{Signer, Verifier};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, Transaction, Witness};

/// Ed25519 keypair for signing transaction inputs.
///
/// Wraps [`ed25519_dalek::SigningKey`]. Use [`KeyPair::generate`] for random
/// keys or [`KeyPair::from_secret_bytes`] for deterministic derivation.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    /// Derive the public key from this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verifying witnesses.
///
/// The key hash (BLAKE3 of the raw 32-byte key) is what a
/// [`LockingPredicate::KeyHash`](crate::types::LockingPredicate) commits to.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Get the raw public key bytes (32 bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Compute the BLAKE3 key hash committed to by outputs.
    pub fn key_hash(&self) -> Hash256 {
        key_hash(&self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// Compute the BLAKE3 key hash from raw public key bytes.
pub fn key_hash(pubkey_bytes: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(pubkey_bytes).into())
}

/// Compute the signing hash (sighash) for a transaction input.
///
/// BLAKE3 over the witness-stripped identity preimage followed by the index
/// of the input being signed. Witness bytes are excluded to allow
/// independent signing of each input.
pub fn signing_hash(tx: &Transaction, input_index: usize) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = tx.identity_preimage();
    data.extend_from_slice(&(input_index as u64).to_le_bytes());
    Ok(Hash256(blake3::hash(&data).into()))
}

/// Sign a transaction input in place.
///
/// Computes the sighash for the given input, signs it with the keypair, and
/// installs the witness. Inputs can be signed in any order since the sighash
/// excludes witnesses.
pub fn sign_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index)?;
    let signature = keypair.sign(sighash.as_bytes());
    tx.inputs[input_index].witness = Some(Witness {
        signature: signature.to_vec(),
        public_key: keypair.public_key().to_bytes().to_vec(),
    });
    Ok(())
}

/// Verify the witness on a transaction input against an expected key hash.
///
/// Checks that the witness public key hashes to `expected_key_hash` and that
/// the signature verifies over the input's sighash.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    expected_key_hash: &Hash256,
) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let witness = tx.inputs[input_index]
        .witness
        .as_ref()
        .ok_or(CryptoError::MissingWitness(input_index))?;

    let pubkey_bytes: [u8; 32] = witness
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    if &key_hash(&pubkey_bytes) != expected_key_hash {
        return Err(CryptoError::KeyHashMismatch);
    }

    let sig_bytes: [u8; 64] = witness
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let public_key = PublicKey::from_bytes(&pubkey_bytes)?;
    let sighash = signing_hash(tx, input_index)?;
    public_key.verify(sighash.as_bytes(), &sig_bytes)
}
