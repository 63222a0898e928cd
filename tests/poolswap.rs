// ========================================
// POOL SWAP
// ========================================
//
// node0: creates the pool and swaps
// node2: observer
// node3: stops after setup and reverts the pool
//
// Usage:
//   cargo test --test poolswap
//
// ========================================

mod common;

use common::{
    amount, balances_of, coins, error_text, network, pool_pairs, setup_tokens, sync, sync_all,
    token_id,
};
use dfx_node::{CreatePoolPairRequest, PoolSwapRequest};
use std::collections::BTreeMap;

fn swap(from: &str, token_from: &str, amount_from: u128, to: &str, token_to: &str) -> PoolSwapRequest {
    PoolSwapRequest {
        from: from.to_string(),
        token_from: token_from.to_string(),
        amount_from,
        to: to.to_string(),
        token_to: token_to.to_string(),
    }
}

#[test]
fn test_pool_swap_and_revert() {
    let nodes = network(4);
    let setup = setup_tokens(&nodes);
    let (n0, n1, n2, n3) = (&nodes[0], &nodes[1], &nodes[2], &nodes[3]);
    // node3 stops here

    let id_gold = token_id(n0, "GOLD");
    let id_silver = token_id(n0, "SILVER");
    let account_gn0 = setup.gold_owner.clone();
    let account_sn1 = setup.silver_owner.clone();
    let owner = n0.get_new_address().unwrap();

    // 1 Transferring SILVER from node1's account to node0's
    let to = BTreeMap::from([(account_gn0.clone(), "1000@SILVER".to_string())]);
    n1.account_to_account(&[], &account_sn1, &to).unwrap();
    n1.generate(1).unwrap();
    sync(n1, n0);
    assert_eq!(n0.token_balance(&account_gn0, "SILVER").unwrap(), coins(1000));
    assert_eq!(n0.token_balance(&account_sn1, "SILVER").unwrap(), coins(1000));

    // 2 Creating the pool pair
    let request: CreatePoolPairRequest = serde_json::from_str(&format!(
        r#"{{"tokenA": "GOLD", "tokenB": "SILVER", "commission": 0.1,
            "status": true, "ownerFeeAddress": "{}", "pairSymbol": "GS"}}"#,
        owner
    ))
    .unwrap();
    n0.create_pool_pair(&request).unwrap();
    n0.generate(1).unwrap();

    assert_eq!(n0.list_tokens(None, true).unwrap().as_object().unwrap().len(), 4);
    let id_gs = token_id(n0, "GS");
    let pool = n0.get_pool_pair("GS").unwrap();
    assert_eq!(pool[&id_gs]["idTokenA"], id_gold.as_str());
    assert_eq!(pool[&id_gs]["idTokenB"], id_silver.as_str());

    // an empty pool does not trade
    let err = error_text(n0.pool_swap(&swap(&account_gn0, "SILVER", coins(10), &account_sn1, "GOLD")));
    assert!(err.contains("Lack of liquidity"), "{}", err);

    // 3 Adding liquidity
    let from = BTreeMap::from([(
        account_gn0.clone(),
        vec!["100@GOLD".to_string(), "500@SILVER".to_string()],
    )]);
    n0.add_pool_liquidity(&from, &account_gn0).unwrap();
    n0.generate(1).unwrap();

    let account = balances_of(n0, &account_gn0);
    assert_eq!(amount(&account[&id_gold]), coins(900));
    assert_eq!(amount(&account[&id_silver]), coins(500));
    let pools = pool_pairs(n0, true);
    assert_eq!(amount(&pools["130"]["reserveA"]), coins(100));
    assert_eq!(amount(&pools["130"]["reserveB"]), coins(500));

    // 4 Swapping 10 SILVER for GOLD
    n0.pool_swap(&swap(&account_gn0, "SILVER", coins(10), &account_sn1, "GOLD"))
        .unwrap();
    n0.generate(1).unwrap();
    sync(n0, n2);

    // 5 Checking the swap on node2
    let gn0 = balances_of(n2, &account_gn0);
    let sn1 = balances_of(n2, &account_sn1);
    let pools = pool_pairs(n2, true);
    assert_eq!(amount(&gn0[&id_gold]), coins(900));
    assert_eq!(amount(&gn0[&id_silver]), coins(490));
    assert_eq!(
        amount(&pools["130"]["reserveA"]) + amount(&sn1[&id_gold]),
        coins(100)
    );
    assert_eq!(amount(&sn1[&id_silver]), coins(1000));
    // 510 - 1 commission
    assert_eq!(amount(&pools["130"]["reserveB"]), coins(509));
    assert_eq!(n2.token_balance(&owner, "SILVER").unwrap(), coins(1));
    // 100 - 100 * 9 / 509
    assert_eq!(pools["130"]["reserveA"].to_string(), "98.23182712");

    // ── Revert ──────────────────────────────────────────────────
    n3.generate(30).unwrap();
    sync_all(&[n0, n1, n2, n3]);
    assert!(pool_pairs(n0, false).as_object().unwrap().is_empty());
    assert_eq!(n0.list_tokens(None, true).unwrap().as_object().unwrap().len(), 3);
}

#[test]
fn test_swap_against_disabled_pool() {
    let nodes = network(2);
    let setup = setup_tokens(&nodes);
    let n0 = &nodes[0];

    let request = CreatePoolPairRequest {
        token_a: "GOLD".to_string(),
        token_b: "SILVER".to_string(),
        commission: 0,
        status: false,
        owner_fee_address: setup.gold_owner.clone(),
        pair_symbol: None,
    };
    n0.create_pool_pair(&request).unwrap();
    n0.generate(1).unwrap();

    let listed = n0.get_pool_pair("GOLD-SILVER").unwrap();
    assert_eq!(listed["130"]["status"], false);

    let err = error_text(n0.pool_swap(&swap(
        &setup.gold_owner,
        "GOLD",
        coins(1),
        &setup.silver_owner,
        "SILVER",
    )));
    assert!(err.contains("is not trading"), "{}", err);
}
