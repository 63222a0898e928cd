use super::CmdResult;
use crate::print_success;
use colored::*;
use dfx_node::Node;
use std::collections::BTreeMap;

pub fn create_token(node: &Node, symbol: &str, name: &str, collateral_address: &str) -> CmdResult {
    let txid = node.create_token(symbol, name, collateral_address)?;
    println!("{}", txid.to_hex());
    print_success(&format!(
        "Token {} pending, collateral locked on {}",
        symbol.yellow(),
        collateral_address
    ));
    Ok(())
}

pub fn destroy_token(node: &Node, token: &str) -> CmdResult {
    println!("{}", node.destroy_token(token)?.to_hex());
    Ok(())
}

pub fn mint_tokens(node: &Node, amounts: &str) -> CmdResult {
    println!("{}", node.mint_tokens(amounts)?.to_hex());
    Ok(())
}

/// `to` is {"address": "amount@token,..."}.
pub fn account_to_account(node: &Node, auth: &[String], from: &str, to: &str) -> CmdResult {
    let to: BTreeMap<String, String> =
        serde_json::from_str(to).map_err(|e| format!("Invalid recipients JSON: {}", e))?;
    println!("{}", node.account_to_account(auth, from, &to)?.to_hex());
    Ok(())
}
