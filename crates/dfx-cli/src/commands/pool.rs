use super::CmdResult;
use dfx_node::{CreatePoolPairRequest, Node, PoolSwapRequest};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn create_pool_pair(node: &Node, metadata: &str) -> CmdResult {
    let request: CreatePoolPairRequest =
        serde_json::from_str(metadata).map_err(|e| format!("Invalid pool metadata: {}", e))?;
    println!("{}", node.create_pool_pair(&request)?.to_hex());
    Ok(())
}

/// Each provider maps to one "amount@token" string or a list of them.
pub fn parse_providers(from: &str) -> Result<BTreeMap<String, Vec<String>>, String> {
    let value: Value =
        serde_json::from_str(from).map_err(|e| format!("Invalid providers JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or("providers must be an object of address -> amounts")?;
    let mut providers = BTreeMap::new();
    for (address, amounts) in object {
        let list = match amounts {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("amount for {} is not a string", address))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(format!("amounts for {} must be a string or a list", address)),
        };
        providers.insert(address.clone(), list);
    }
    Ok(providers)
}

pub fn add_pool_liquidity(node: &Node, from: &str, share_address: &str) -> CmdResult {
    let providers = parse_providers(from)?;
    println!("{}", node.add_pool_liquidity(&providers, share_address)?.to_hex());
    Ok(())
}

pub fn remove_pool_liquidity(node: &Node, from: &str, amount: &str) -> CmdResult {
    println!("{}", node.remove_pool_liquidity(from, amount)?.to_hex());
    Ok(())
}

pub fn pool_swap(node: &Node, metadata: &str) -> CmdResult {
    let request: PoolSwapRequest =
        serde_json::from_str(metadata).map_err(|e| format!("Invalid swap metadata: {}", e))?;
    println!("{}", node.pool_swap(&request)?.to_hex());
    Ok(())
}
