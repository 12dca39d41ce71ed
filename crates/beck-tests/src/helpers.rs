//! Shared test helpers for the behavioral suites.

use std::sync::Arc;

use beck_core::crypto::{self, KeyPair};
use beck_core::traits::{ChainView, MemoryChainView};
use beck_core::types::*;
use beck_mempool::{Mempool, PoolConfig};
use beck_verify::engine::Ed25519Engine;
use beck_verify::worker::{WorkerPool, WorkerPoolConfig};

/// Deterministic wallet keypair from a seed byte.
pub fn wallet(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// The key hash a wallet's outputs pay to.
pub fn key_of(kp: &KeyPair) -> Hash256 {
    kp.public_key().key_hash()
}

/// An outpoint with a synthetic txid derived from `seed`.
pub fn outpoint(seed: u8, index: u64) -> OutPoint {
    OutPoint {
        txid: Hash256([seed; 32]),
        index,
    }
}

/// A confirmed coin paying the given key hash.
pub fn confirmed_coin(value: u64, key: Hash256) -> Coin {
    Coin {
        value,
        lock: LockingPredicate::KeyHash(key),
        height: 1,
        is_coinbase: false,
        provenance: Provenance::Confirmed,
    }
}

/// A transaction spending the given outpoints, every input signed by `kp`.
pub fn signed_tx(kp: &KeyPair, inputs: &[OutPoint], outputs: &[(u64, Hash256)]) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        inputs: inputs
            .iter()
            .map(|op| TxInput {
                previous_output: op.clone(),
                witness: None,
            })
            .collect(),
        outputs: outputs
            .iter()
            .map(|&(value, key)| TxOutput {
                value,
                lock: LockingPredicate::KeyHash(key),
            })
            .collect(),
        lock_time: 0,
    };
    for index in 0..tx.inputs.len() {
        crypto::sign_input(&mut tx, index, kp).unwrap();
    }
    tx
}

/// Coinbase with `lock_time: height` so each block's coinbase has a
/// distinct txid (witness bytes are outside the identity hash).
pub fn coinbase(height: u64, value: u64, key: Hash256) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            witness: Some(Witness {
                signature: height.to_le_bytes().to_vec(),
                public_key: vec![],
            }),
        }],
        outputs: vec![TxOutput {
            value,
            lock: LockingPredicate::KeyHash(key),
        }],
        lock_time: height,
    }
}

/// A block with a coinbase followed by the given transactions.
pub fn make_block(height: u64, mut txs: Vec<Transaction>) -> Block {
    let mut transactions = vec![coinbase(height, 50_000, Hash256([0xCB; 32]))];
    transactions.append(&mut txs);
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256([(height & 0xFF) as u8; 32]),
            merkle_root: Hash256::ZERO,
            timestamp: 1_700_000_000 + height,
        },
        transactions,
    }
}

/// Mirror a block into the chain view the way the external chain authority
/// would: advance the tip, spend inputs, create outputs.
pub fn apply_block_to_chain(chain: &MemoryChainView, block: &Block, height: u64) {
    chain.set_height(height);
    for tx in &block.transactions {
        for input in &tx.inputs {
            if !input.previous_output.is_null() {
                chain.remove_coin(&input.previous_output);
            }
        }
        let txid = tx.txid();
        for (index, output) in tx.outputs.iter().enumerate() {
            chain.add_coin(
                OutPoint {
                    txid,
                    index: index as u64,
                },
                Coin {
                    value: output.value,
                    lock: output.lock.clone(),
                    height,
                    is_coinbase: tx.is_coinbase(),
                    provenance: Provenance::Confirmed,
                },
            );
        }
    }
}

/// A chain view at height 10 with one confirmed coin per `(seed, value)`.
pub fn funded_chain(kp: &KeyPair, coins: &[(u8, u64)]) -> Arc<MemoryChainView> {
    let chain = Arc::new(MemoryChainView::new());
    chain.set_height(10);
    for &(seed, value) in coins {
        chain.add_coin(outpoint(seed, 0), confirmed_coin(value, key_of(kp)));
    }
    chain
}

/// A pool over the given chain, verifying through a real worker pool.
pub fn standard_pool(chain: Arc<MemoryChainView>) -> Mempool {
    let workers = WorkerPool::spawn(
        Arc::new(Ed25519Engine::new()),
        WorkerPoolConfig {
            workers: 2,
            ..WorkerPoolConfig::default()
        },
    );
    Mempool::new(
        chain as Arc<dyn ChainView>,
        Arc::new(workers),
        PoolConfig::default(),
    )
}
