// Shared multi-node harness for the integration tests.
//
// Nodes are in-memory and never talk to each other on their own: a "stopped"
// node is simply one the test does not sync, and `sync` hands one node's
// active chain to another.

#![allow(dead_code)]

use dfx_core::{Amount, ChainParams, COIN};
use dfx_node::rpc::Pagination;
use dfx_node::Node;
use serde_json::Value;

pub fn network(n: usize) -> Vec<Node> {
    (0..n)
        .map(|i| Node::in_memory(&format!("node{}", i), ChainParams::default()).unwrap())
        .collect()
}

/// Offer `from`'s chain to `to`.
pub fn sync(from: &Node, to: &Node) {
    to.accept_chain(&from.blocks().unwrap()).unwrap();
}

/// Bring every node in `nodes` to the longest chain among them.
pub fn sync_all(nodes: &[&Node]) {
    let longest = nodes
        .iter()
        .max_by_key(|n| n.block_count().unwrap())
        .unwrap();
    let blocks = longest.blocks().unwrap();
    for node in nodes {
        node.accept_chain(&blocks).unwrap();
    }
    let tip = longest.best_block_hash().unwrap();
    for node in nodes {
        assert_eq!(node.best_block_hash().unwrap(), tip);
    }
}

pub fn coins(whole: u128) -> Amount {
    whole * COIN
}

/// Token id behind a `gettoken` result.
pub fn token_id(node: &Node, key: &str) -> String {
    let token = node.get_token(key).unwrap();
    token.as_object().unwrap().keys().next().unwrap().clone()
}

pub fn mempool_hex(node: &Node) -> Vec<String> {
    node.raw_mempool()
        .unwrap()
        .iter()
        .map(|txid| txid.to_hex())
        .collect()
}

pub fn error_text<T: std::fmt::Debug>(result: Result<T, dfx_node::NodeError>) -> String {
    result.unwrap_err().to_string()
}

/// Confirmed balances of `address` keyed by token id.
pub fn balances_of(node: &Node, address: &str) -> Value {
    node.get_account(address, Pagination::default(), true).unwrap()
}

/// Every pool pair.
pub fn pool_pairs(node: &Node, verbose: bool) -> Value {
    node.list_pool_pairs(Pagination::default(), verbose).unwrap()
}

pub fn amount(value: &Value) -> Amount {
    dfx_node::rpc::value_amount(value).unwrap()
}

/// Holders of the tokens minted by `setup_tokens`.
pub struct TokenSetup {
    /// node0's default address, holds 1000 GOLD
    pub gold_owner: String,
    /// node1's default address, holds 2000 SILVER
    pub silver_owner: String,
}

/// Mature coins on node0 and node1, GOLD (128) minted to node0's default
/// address and SILVER (129) to node1's, with every node synced.
pub fn setup_tokens(nodes: &[Node]) -> TokenSetup {
    let all: Vec<&Node> = nodes.iter().collect();
    let (n0, n1) = (&nodes[0], &nodes[1]);

    n1.generate(10).unwrap();
    sync_all(&all);
    n0.generate(101).unwrap();
    sync_all(&all);

    let gold_owner = n0.default_address().unwrap();
    let silver_owner = n1.default_address().unwrap();

    n0.create_token("GOLD", "shiny gold", &gold_owner).unwrap();
    n0.generate(1).unwrap();
    sync_all(&all);
    n1.create_token("SILVER", "just silver", &silver_owner).unwrap();
    n1.generate(1).unwrap();
    sync_all(&all);

    n0.mint_tokens("1000@GOLD").unwrap();
    n0.generate(1).unwrap();
    sync_all(&all);
    n1.mint_tokens("2000@SILVER").unwrap();
    n1.generate(1).unwrap();
    sync_all(&all);

    assert_eq!(n0.token_balance(&gold_owner, "GOLD").unwrap(), coins(1000));
    assert_eq!(n0.token_balance(&silver_owner, "SILVER").unwrap(), coins(2000));
    TokenSetup {
        gold_owner,
        silver_owner,
    }
}
