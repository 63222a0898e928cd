//! JSON shapes of the command surface.
//!
//! Amounts are emitted as exact decimal numbers ("509", "1.76817288"), which
//! is why serde_json is built with `arbitrary_precision`.

use dfx_core::pool::PoolPair;
use dfx_core::{format_amount, parse_amount, Amount, DctId, LedgerState, Token, TokenBalances};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Number, Value};
use std::str::FromStr;

/// Exact decimal JSON number for a fixed-point amount.
pub fn amount_value(amount: Amount) -> Value {
    let text = format_amount(amount);
    match Number::from_str(&text) {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(text),
    }
}

/// Read an amount back out of a JSON value (number or string).
pub fn value_amount(value: &Value) -> Option<Amount> {
    match value {
        Value::Number(n) => parse_amount(&n.to_string()).ok(),
        Value::String(s) => parse_amount(s).ok(),
        _ => None,
    }
}

/// Accepts `0.1` or `"0.1"` for an amount field.
mod amount_json {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        let value = Value::deserialize(d)?;
        value_amount(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {}", value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolPairRequest {
    pub token_a: String,
    pub token_b: String,
    #[serde(deserialize_with = "amount_json::deserialize")]
    pub commission: Amount,
    #[serde(default = "enabled")]
    pub status: bool,
    pub owner_fee_address: String,
    #[serde(default)]
    pub pair_symbol: Option<String>,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSwapRequest {
    pub from: String,
    pub token_from: String,
    #[serde(deserialize_with = "amount_json::deserialize")]
    pub amount_from: Amount,
    pub to: String,
    pub token_to: String,
}

/// Window over an id-ordered listing. `start` itself is skipped unless
/// `including_start` is set; no `limit` lists everything after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pagination {
    pub start: Option<DctId>,
    pub including_start: bool,
    pub limit: Option<usize>,
}

impl Pagination {
    fn admits(&self, id: DctId) -> bool {
        match self.start {
            Some(start) if self.including_start => id >= start,
            Some(start) => id > start,
            None => true,
        }
    }

    pub fn apply<T, I>(self, items: I) -> impl Iterator<Item = (DctId, T)>
    where
        I: IntoIterator<Item = (DctId, T)>,
    {
        items
            .into_iter()
            .filter(move |(id, _)| self.admits(*id))
            .take(self.limit.unwrap_or(usize::MAX))
    }
}

pub fn token_json(token: &Token, verbose: bool) -> Value {
    let mut value = json!({
        "symbol": token.symbol,
        "name": token.name,
    });
    if verbose {
        if let Value::Object(map) = &mut value {
            map.insert("isLPS".into(), json!(token.is_lps));
            map.insert("mintable".into(), json!(token.is_mintable()));
            map.insert("tradeable".into(), json!(token.is_tradeable()));
            map.insert(
                "collateralAddress".into(),
                json!(token.collateral_address.clone().unwrap_or_default()),
            );
            map.insert("creationTx".into(), json!(token.creation_tx.to_hex()));
            map.insert("creationHeight".into(), json!(token.creation_height));
            map.insert("destructionTx".into(), json!(token.destruction_tx.to_hex()));
            map.insert("destructionHeight".into(), json!(token.destruction_height));
            map.insert("minted".into(), amount_value(token.minted));
        }
    }
    value
}

/// `{id: token}`, id order.
pub fn tokens_json<'a, I>(tokens: I, verbose: bool) -> Value
where
    I: IntoIterator<Item = &'a Token>,
{
    let mut map = Map::new();
    for token in tokens {
        map.insert(token.id.to_string(), token_json(token, verbose));
    }
    Value::Object(map)
}

pub fn pool_json(state: &LedgerState, pool: &PoolPair, verbose: bool) -> Value {
    let name = state
        .tokens
        .get(pool.id)
        .map(|t| t.name.clone())
        .unwrap_or_default();
    let mut value = json!({
        "symbol": pool.symbol,
        "name": name,
        "status": pool.status,
        "idTokenA": pool.token_a.to_string(),
        "idTokenB": pool.token_b.to_string(),
        "reversed": pool.reversed,
    });
    if verbose {
        if let Value::Object(map) = &mut value {
            let [(first, first_reserve), (second, second_reserve)] = pool.as_created();
            map.insert(
                "asCreated".into(),
                json!({
                    "idTokenA": first.to_string(),
                    "idTokenB": second.to_string(),
                    "reserveA": amount_value(first_reserve),
                    "reserveB": amount_value(second_reserve),
                }),
            );
            map.insert("reserveA".into(), amount_value(pool.reserve_a));
            map.insert("reserveB".into(), amount_value(pool.reserve_b));
            map.insert("commission".into(), amount_value(pool.commission));
            map.insert("totalLiquidity".into(), amount_value(pool.total_liquidity));
            map.insert("ownerFeeAddress".into(), json!(pool.owner_fee_address));
            map.insert("tradeEnabled".into(), json!(pool.status && pool.is_funded()));
            map.insert("creationTx".into(), json!(pool.creation_tx.to_hex()));
            map.insert("creationHeight".into(), json!(pool.creation_height));
        }
    }
    value
}

pub fn pools_json(state: &LedgerState, page: Pagination, verbose: bool) -> Value {
    let mut map = Map::new();
    for (id, pool) in page.apply(state.pools.iter().map(|(id, p)| (*id, p))) {
        map.insert(id.to_string(), pool_json(state, pool, verbose));
    }
    Value::Object(map)
}

/// `{id: amount}` with ids, otherwise `["amount@SYMBOL", ...]`.
pub fn account_json(
    state: &LedgerState,
    balances: Option<&TokenBalances>,
    page: Pagination,
    include_ids: bool,
) -> Value {
    let empty = TokenBalances::new();
    let balances = page.apply(
        balances
            .unwrap_or(&empty)
            .iter()
            .map(|(id, amount)| (*id, *amount)),
    );
    if include_ids {
        let mut map = Map::new();
        for (id, amount) in balances {
            map.insert(id.to_string(), amount_value(amount));
        }
        Value::Object(map)
    } else {
        Value::Array(
            balances
                .map(|(id, amount)| {
                    let symbol = state
                        .tokens
                        .get(id)
                        .map(|t| t.symbol.clone())
                        .unwrap_or_else(|| id.to_string());
                    Value::String(format!("{}@{}", format_amount(amount), symbol))
                })
                .collect(),
        )
    }
}
