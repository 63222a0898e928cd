// ========================================
// REORG DETERMINISM & PERSISTENCE
// ========================================
//
// 1. Disconnect/reconnect reproduces bit-identical state
// 2. Equal-length forks: first seen wins
// 3. sled-backed node survives a restart mid-reorg history
//
// Usage:
//   cargo test --test reorg_determinism
//
// ========================================

mod common;

use common::{coins, network, pool_pairs, setup_tokens, sync, sync_all};
use dfx_core::COIN;
use dfx_node::{CreatePoolPairRequest, Node, NodeConfig, PoolSwapRequest};
use std::collections::BTreeMap;

fn create_gs(node: &Node, owner: &str) {
    let request = CreatePoolPairRequest {
        token_a: "GOLD".to_string(),
        token_b: "SILVER".to_string(),
        commission: COIN / 100,
        status: true,
        owner_fee_address: owner.to_string(),
        pair_symbol: Some("GS".to_string()),
    };
    node.create_pool_pair(&request).unwrap();
}

#[test]
fn test_disconnect_reconnect_is_bit_identical() {
    let nodes = network(2);
    let setup = setup_tokens(&nodes);
    let (n0, n1) = (&nodes[0], &nodes[1]);
    let base = n0.block_count().unwrap();

    let to = BTreeMap::from([(setup.gold_owner.clone(), "1500@SILVER".to_string())]);
    n1.account_to_account(&[], &setup.silver_owner, &to).unwrap();
    n1.generate(1).unwrap();
    sync(n1, n0);

    let owner = n0.get_new_address().unwrap();
    create_gs(n0, &owner);
    let from = BTreeMap::from([(
        setup.gold_owner.clone(),
        vec!["300@GOLD".to_string(), "900@SILVER".to_string()],
    )]);
    n0.add_pool_liquidity(&from, &setup.gold_owner).unwrap();
    n0.generate(1).unwrap();

    // a few blocks of swaps both ways
    let mut roots = vec![(n0.block_count().unwrap(), n0.state_root().unwrap())];
    for (i, (token_from, token_to)) in [("SILVER", "GOLD"), ("GOLD", "SILVER")]
        .iter()
        .cycle()
        .take(6)
        .enumerate()
    {
        n0.pool_swap(&PoolSwapRequest {
            from: setup.gold_owner.clone(),
            token_from: token_from.to_string(),
            amount_from: coins(i as u128 + 1) + 12_345_678,
            to: setup.silver_owner.clone(),
            token_to: token_to.to_string(),
        })
        .unwrap();
        n0.generate(1).unwrap();
        n0.tip_state().unwrap().audit_supply().unwrap();
        roots.push((n0.block_count().unwrap(), n0.state_root().unwrap()));
    }
    let full_chain = n0.blocks().unwrap();
    let final_root = n0.state_root().unwrap();

    // walk back down, each height matches the root recorded on the way up
    for (height, root) in roots.iter().rev().skip(1) {
        n0.invalidate_tip().unwrap();
        assert_eq!(n0.block_count().unwrap(), *height);
        assert_eq!(&n0.state_root().unwrap(), root);
    }
    while n0.block_count().unwrap() > base {
        n0.invalidate_tip().unwrap();
    }
    assert!(pool_pairs(n0, false).as_object().unwrap().is_empty());
    assert!(!n0.raw_mempool().unwrap().is_empty());

    // reconnect the same blocks
    assert!(n0.accept_chain(&full_chain).unwrap());
    assert_eq!(n0.state_root().unwrap(), final_root);
    assert!(n0.raw_mempool().unwrap().is_empty());

    // and a node that never saw the history computes the same state
    let fresh = &network(1)[0];
    assert!(fresh.accept_chain(&full_chain).unwrap());
    assert_eq!(fresh.state_root().unwrap(), final_root);
}

#[test]
fn test_equal_length_fork_keeps_first_seen() {
    let nodes = network(2);
    let (n0, n1) = (&nodes[0], &nodes[1]);
    n0.generate(5).unwrap();
    sync_all(&[n0, n1]);

    n0.generate(1).unwrap();
    n1.generate(1).unwrap();
    assert_ne!(n0.best_block_hash().unwrap(), n1.best_block_hash().unwrap());

    assert!(!n0.accept_chain(&n1.blocks().unwrap()).unwrap());
    assert!(!n1.accept_chain(&n0.blocks().unwrap()).unwrap());

    // one more block breaks the tie
    n1.generate(1).unwrap();
    assert!(n0.accept_chain(&n1.blocks().unwrap()).unwrap());
    assert_eq!(n0.best_block_hash().unwrap(), n1.best_block_hash().unwrap());
}

#[test]
fn test_restart_after_reorg() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::new("durable");
    config.chain.coinbase_maturity = 5;
    config.data_dir = Some(dir.path().to_path_buf());

    let mut other_config = NodeConfig::new("rival");
    other_config.chain.coinbase_maturity = 5;
    let rival = Node::new(other_config).unwrap();

    let (root, tip, pending) = {
        let node = Node::new(config.clone()).unwrap();
        node.generate(6).unwrap();
        rival.accept_chain(&node.blocks().unwrap()).unwrap();

        let collateral = node.get_new_address().unwrap();
        node.create_token("GOLD", "shiny gold", &collateral).unwrap();
        node.generate(2).unwrap();
        assert_eq!(node.list_tokens(None, true).unwrap().as_object().unwrap().len(), 2);

        // rival overtakes: the creation goes back to the mempool
        rival.generate(3).unwrap();
        assert!(node.accept_chain(&rival.blocks().unwrap()).unwrap());
        assert_eq!(node.list_tokens(None, true).unwrap().as_object().unwrap().len(), 1);
        (
            node.state_root().unwrap(),
            node.best_block_hash().unwrap(),
            node.raw_mempool().unwrap(),
        )
    };
    assert_eq!(pending.len(), 1);

    let node = Node::new(config).unwrap();
    assert_eq!(node.state_root().unwrap(), root);
    assert_eq!(node.best_block_hash().unwrap(), tip);
    assert_eq!(node.raw_mempool().unwrap(), pending);
    node.tip_state().unwrap().audit_supply().unwrap();

    node.generate(1).unwrap();
    assert_eq!(node.list_tokens(None, true).unwrap().as_object().unwrap().len(), 2);
}
