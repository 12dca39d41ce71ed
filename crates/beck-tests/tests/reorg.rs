//! Reorg behavior and admission-order properties.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use beck_core::traits::ChainView;
use beck_core::types::*;
use beck_mempool::{Mempool, PoolConfig};
use beck_tests::helpers::*;
use beck_verify::engine::Ed25519Engine;
use beck_verify::worker::InlineVerifier;

fn inline_pool(chain: Arc<beck_core::traits::MemoryChainView>) -> Mempool {
    Mempool::new(
        chain as Arc<dyn ChainView>,
        Arc::new(InlineVerifier::new(Arc::new(Ed25519Engine::new()))),
        PoolConfig::default(),
    )
}

// ======================================================================
// Reorg round trip: confirm, roll back, reinstate.
// ======================================================================

#[tokio::test]
async fn disconnected_transactions_return_to_the_pool() {
    let kp = wallet(0xC1);
    let chain = funded_chain(&kp, &[(0x01, 10_000)]);
    let pool = standard_pool(Arc::clone(&chain));
    let watched: HashSet<Hash256> = [key_of(&kp)].into_iter().collect();

    let tx = signed_tx(&kp, &[outpoint(0x01, 0)], &[(8_000, key_of(&kp))]);
    let txid = tx.txid();
    assert!(pool.submit(tx.clone()).await.is_admitted());
    assert_eq!(pool.balance(&watched), 8_000);

    // Confirm.
    let block = make_block(11, vec![tx]);
    apply_block_to_chain(&chain, &block, 11);
    pool.connect_block(&block).await.unwrap();
    assert!(pool.is_empty());
    assert_eq!(pool.balance(&watched), 0);

    // Reorg: the chain authority rolls back to the parent tip.
    chain.set_height(10);
    for tx in &block.transactions {
        let block_txid = tx.txid();
        for (index, _) in tx.outputs.iter().enumerate() {
            chain.remove_coin(&OutPoint { txid: block_txid, index: index as u64 });
        }
    }
    chain.add_coin(outpoint(0x01, 0), confirmed_coin(10_000, key_of(&kp)));

    let reinstated = pool.disconnect_block(&block).await.unwrap();
    assert_eq!(reinstated, 1);
    assert!(pool.contains(&txid));
    assert_eq!(pool.balance(&watched), 8_000);
}

#[tokio::test]
async fn reorg_preserves_pooled_descendant_of_confirmed_parent() {
    let kp = wallet(0xC2);
    let chain = funded_chain(&kp, &[(0x01, 20_000)]);
    let pool = standard_pool(Arc::clone(&chain));

    let parent = signed_tx(&kp, &[outpoint(0x01, 0)], &[(18_000, key_of(&kp))]);
    let parent_txid = parent.txid();
    let child = signed_tx(
        &kp,
        &[OutPoint { txid: parent_txid, index: 0 }],
        &[(16_000, key_of(&kp))],
    );
    let child_txid = child.txid();
    pool.submit(parent.clone()).await;
    pool.submit(child).await;

    // Only the parent confirms.
    let block = make_block(11, vec![parent]);
    apply_block_to_chain(&chain, &block, 11);
    pool.connect_block(&block).await.unwrap();
    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&child_txid));

    // Reorg the parent back out.
    chain.set_height(10);
    for tx in &block.transactions {
        let block_txid = tx.txid();
        for (index, _) in tx.outputs.iter().enumerate() {
            chain.remove_coin(&OutPoint { txid: block_txid, index: index as u64 });
        }
    }
    chain.add_coin(outpoint(0x01, 0), confirmed_coin(20_000, key_of(&kp)));

    pool.disconnect_block(&block).await.unwrap();

    // Both generations are pooled again and the child still spends the
    // parent's output.
    assert!(pool.contains(&parent_txid));
    assert!(pool.contains(&child_txid));
    assert_eq!(pool.len(), 2);
}

// ======================================================================
// Admission order property: a dependency chain reaches the same pool
// regardless of submission order (orphan parking absorbs reordering).
// ======================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn chain_admission_is_order_independent(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let kp = wallet(0xC3);
            let chain = funded_chain(&kp, &[(0x01, 20_000)]);
            let pool = inline_pool(chain);

            let t0 = signed_tx(&kp, &[outpoint(0x01, 0)], &[(18_000, key_of(&kp))]);
            let t1 = signed_tx(
                &kp,
                &[OutPoint { txid: t0.txid(), index: 0 }],
                &[(16_000, key_of(&kp))],
            );
            let t2 = signed_tx(
                &kp,
                &[OutPoint { txid: t1.txid(), index: 0 }],
                &[(14_000, key_of(&kp))],
            );
            let txs = [t0, t1, t2];

            for &i in &order {
                pool.submit(txs[i].clone()).await;
            }

            // Whatever the order, the full chain ends up pooled.
            prop_assert_eq!(pool.len(), 3);
            prop_assert_eq!(pool.orphan_count(), 0);
            for tx in &txs {
                prop_assert!(pool.contains(&tx.txid()));
            }
            Ok(())
        })?;
    }
}
