//! Core protocol types: transactions, blocks, coins.
//!
//! All monetary values are in becks (1 BECK = 10^8 becks).
//!
//! Transactions carry authorization data in a detachable [`Witness`]. The
//! transaction identity hash ([`Transaction::txid`]) is computed over an
//! explicit witness-stripped byte layout, while [`Transaction::wtxid`] also
//! commits to witness bytes. Two encodings that differ only in witness data
//! share a txid but never a wtxid — the distinction the pool uses to tell
//! malleation apart from structural identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::TxError;

/// A 32-byte hash value.
///
/// Used for transaction IDs and witness IDs (BLAKE3), block header hashes
/// (double SHA-256), and public key hashes (BLAKE3).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// Authorization data for one input: an Ed25519 signature and public key.
///
/// Witness bytes are excluded from [`Transaction::txid`]. Altering them
/// changes the wtxid but never the transaction's identity.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Witness {
    /// Ed25519 signature (64 bytes). Coinbase inputs reuse this field for
    /// arbitrary miner data.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes).
    pub public_key: Vec<u8>,
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Authorization data. `None` when the spent predicate requires none.
    pub witness: Option<Witness>,
}

/// The spending condition committed to by an output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum LockingPredicate {
    /// Spendable by a witness whose public key BLAKE3-hashes to this value.
    KeyHash(Hash256),
    /// Anyone-can-spend. A spending input must carry no witness.
    Open,
    /// Provably unspendable (burn output).
    Unspendable,
}

impl LockingPredicate {
    /// Whether a spending input is expected to carry a witness.
    pub fn requires_witness(&self) -> bool {
        matches!(self, Self::KeyHash(_))
    }

    /// Append this predicate's identity bytes (tag + payload).
    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::KeyHash(hash) => {
                out.push(0);
                out.extend_from_slice(hash.as_bytes());
            }
            Self::Open => out.push(1),
            Self::Unspendable => out.push(2),
        }
    }
}

/// A transaction output, creating a new spendable coin.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in becks (1 BECK = 10^8 becks).
    pub value: u64,
    /// Spending condition for this output.
    pub lock: LockingPredicate,
}

/// A transaction transferring value between predicates.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height before which this tx is invalid. Zero disables the lock.
    pub lock_time: u64,
}

impl Transaction {
    /// Witness-stripped identity preimage: version, input outpoints,
    /// outputs, and lock_time in a fixed little-endian layout.
    ///
    /// Shared between [`txid`](Self::txid) and the per-input signing hash
    /// (`crypto::signing_hash`), so signatures commit to exactly the
    /// identity the pool keys on.
    pub(crate) fn identity_preimage(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&(self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(input.previous_output.txid.as_bytes());
            data.extend_from_slice(&input.previous_output.index.to_le_bytes());
        }
        data.extend_from_slice(&(self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            output.lock.write_bytes(&mut data);
        }
        data.extend_from_slice(&self.lock_time.to_le_bytes());
        data
    }

    /// Compute the transaction ID: BLAKE3 over the witness-stripped layout.
    ///
    /// Witness bytes never feed into this hash, so resubmitting the same
    /// transaction with altered signatures yields the same txid.
    pub fn txid(&self) -> Hash256 {
        Hash256(blake3::hash(&self.identity_preimage()).into())
    }

    /// Compute the witness transaction ID: BLAKE3 over the full canonical
    /// encoding including witness bytes.
    pub fn wtxid(&self) -> Result<Hash256, TxError> {
        let encoded = self.encode()?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Canonical full encoding (bincode standard config), witness included.
    pub fn encode(&self) -> Result<Vec<u8>, TxError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TxError::Serialization(e.to_string()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Outpoints created by this transaction, in output order.
    pub fn created_outpoints(&self) -> Vec<OutPoint> {
        let txid = self.txid();
        (0..self.outputs.len() as u64)
            .map(|index| OutPoint { txid, index })
            .collect()
    }
}

/// Block header. Hash is double SHA-256 over a fixed byte layout.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// Merkle root of the block's transaction IDs.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing.
    const HASH_SIZE: usize = 2 * 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Explicit fixed layout: version || prev_hash || merkle_root ||
    /// timestamp, all little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Ordered list of transactions. First transaction must be coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Get the coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

/// Where a spendable coin comes from.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum Provenance {
    /// Owned by the confirmed chain's output set.
    Confirmed,
    /// Produced by a pooled, not-yet-mined transaction.
    Unconfirmed,
}

/// A spendable transaction output with its context.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Coin {
    /// Value in becks.
    pub value: u64,
    /// Spending condition.
    pub lock: LockingPredicate,
    /// Height of the block that created this coin. For unconfirmed coins,
    /// the tip height at admission time.
    pub height: u64,
    /// Whether this output is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Confirmed-chain or pool provenance.
    pub provenance: Provenance,
}

impl Coin {
    /// Check if this coin has matured and can be spent.
    ///
    /// Coinbase outputs require [`COINBASE_MATURITY`](crate::constants::COINBASE_MATURITY)
    /// confirmations. Non-coinbase outputs are always mature.
    pub fn is_mature(&self, current_height: u64) -> bool {
        if !self.is_coinbase {
            return true;
        }
        current_height.saturating_sub(self.height) >= crate::constants::COINBASE_MATURITY
    }
}
