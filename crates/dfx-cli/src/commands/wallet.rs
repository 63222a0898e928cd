use super::{print_json, CmdResult};
use crate::print_success;
use colored::*;
use dfx_core::{format_amount, parse_amount, Transaction};
use dfx_node::Node;
use serde_json::json;

pub fn get_new_address(node: &Node) -> CmdResult {
    println!("{}", node.get_new_address()?);
    Ok(())
}

pub fn import_address(node: &Node, address: &str) -> CmdResult {
    if node.import_address(address)? {
        print_success(&format!("Watching {}", address.green()));
    } else {
        println!("{} already in wallet", address);
    }
    Ok(())
}

pub fn get_balance(node: &Node) -> CmdResult {
    println!("{}", format_amount(node.get_balance()?));
    Ok(())
}

pub fn send_to_address(node: &Node, address: &str, amount: &str) -> CmdResult {
    let amount = parse_amount(amount)?;
    println!("{}", node.send_to_address(address, amount)?.to_hex());
    Ok(())
}

pub fn send_raw_transaction(node: &Node, tx: &str) -> CmdResult {
    let tx: Transaction =
        serde_json::from_str(tx).map_err(|e| format!("Invalid transaction JSON: {}", e))?;
    println!("{}", node.send_raw_transaction(tx)?.to_hex());
    Ok(())
}

pub fn raw_mempool(node: &Node) -> CmdResult {
    let txids: Vec<String> = node.raw_mempool()?.iter().map(|t| t.to_hex()).collect();
    print_json(&json!(txids))
}

pub fn mempool_info(node: &Node) -> CmdResult {
    print_json(&serde_json::to_value(node.mempool_stats()?)?)
}
