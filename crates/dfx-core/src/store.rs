//! # Key-value layout of ledger state
//!
//! One record per entity slot, keyed by a one-byte table prefix:
//!
//! | prefix | key                      | value                                |
//! |--------|--------------------------|--------------------------------------|
//! | `T`    | token id (BE u32)        | `Token`                              |
//! | `S`    | symbol bytes             | `(symbol, id)`                       |
//! | `c`    | creation txid            | `(txid, id)`                         |
//! | `L`    | -                        | next token id                        |
//! | `K`    | outpoint                 | `(outpoint, CollateralLock)`         |
//! | `B`    | address, 0x00, token id  | `(address, token id, amount)`        |
//! | `P`    | pool id (BE u32)         | `PoolPair`                           |
//! | `p`    | token a, token b         | `((a, b), pool id)`                  |
//! | `U`    | outpoint                 | `(outpoint, Coin)`                   |
//!
//! Values are bincode and self-describing, so loading never parses keys.
//! A block's undo entries name exactly the slots it touched; the same keys
//! are what a storage commit has to rewrite.

use crate::amount::Amount;
use crate::coins::Coin;
use crate::collateral::CollateralLock;
use crate::pool::PoolPair;
use crate::primitives::{DctId, OutPoint, TxId};
use crate::state::LedgerState;
use crate::tokens::Token;
use crate::undo::UndoEntry;
use std::collections::BTreeMap;

pub type Record = (Vec<u8>, Vec<u8>);

const TOKEN: u8 = b'T';
const SYMBOL: u8 = b'S';
const CREATION_TX: u8 = b'c';
const NEXT_ID: u8 = b'L';
const LOCK: u8 = b'K';
const BALANCE: u8 = b'B';
const POOL: u8 = b'P';
const PAIR: u8 = b'p';
const UTXO: u8 = b'U';

fn token_key(id: DctId) -> Vec<u8> {
    let mut key = vec![TOKEN];
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn symbol_key(symbol: &str) -> Vec<u8> {
    let mut key = vec![SYMBOL];
    key.extend_from_slice(symbol.as_bytes());
    key
}

fn creation_key(txid: &TxId) -> Vec<u8> {
    let mut key = vec![CREATION_TX];
    key.extend_from_slice(&txid.0);
    key
}

fn outpoint_key(prefix: u8, outpoint: &OutPoint) -> Vec<u8> {
    let mut key = vec![prefix];
    key.extend_from_slice(&outpoint.txid.0);
    key.extend_from_slice(&outpoint.vout.to_be_bytes());
    key
}

fn balance_key(address: &str, token: DctId) -> Vec<u8> {
    let mut key = vec![BALANCE];
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key.extend_from_slice(&token.to_be_bytes());
    key
}

fn pool_key(id: DctId) -> Vec<u8> {
    let mut key = vec![POOL];
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn pair_key(pair: (DctId, DctId)) -> Vec<u8> {
    let mut key = vec![PAIR];
    key.extend_from_slice(&pair.0.to_be_bytes());
    key.extend_from_slice(&pair.1.to_be_bytes());
    key
}

/// Every record of `state`, sorted by key.
pub fn state_records(state: &LedgerState) -> bincode::Result<Vec<Record>> {
    let mut out = BTreeMap::new();
    for (id, token) in state.tokens.iter() {
        out.insert(token_key(*id), bincode::serialize(token)?);
    }
    for (symbol, id) in state.tokens.symbol_index() {
        out.insert(symbol_key(symbol), bincode::serialize(&(symbol, id))?);
    }
    for (txid, id) in state.tokens.creation_index() {
        out.insert(creation_key(txid), bincode::serialize(&(txid, id))?);
    }
    out.insert(vec![NEXT_ID], bincode::serialize(&state.tokens.next_id())?);
    for (outpoint, lock) in state.locks.iter() {
        out.insert(outpoint_key(LOCK, outpoint), bincode::serialize(&(outpoint, lock))?);
    }
    for (address, balances) in state.balances.iter() {
        for (token, amount) in balances {
            out.insert(
                balance_key(address, *token),
                bincode::serialize(&(address, token, amount))?,
            );
        }
    }
    for (id, pool) in state.pools.iter() {
        out.insert(pool_key(*id), bincode::serialize(pool)?);
    }
    for (pair, id) in state.pools.pair_index() {
        out.insert(pair_key(*pair), bincode::serialize(&(pair, id))?);
    }
    for (outpoint, coin) in state.coins.iter() {
        out.insert(outpoint_key(UTXO, outpoint), bincode::serialize(&(outpoint, coin))?);
    }
    Ok(out.into_iter().collect())
}

/// Current value (or deletion) of every slot named by `entries`.
pub fn dirty_records(
    state: &LedgerState,
    entries: &[UndoEntry],
) -> bincode::Result<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
    let mut out = BTreeMap::new();
    for entry in entries {
        let (key, value) = match entry {
            UndoEntry::Coin { outpoint, .. } => (
                outpoint_key(UTXO, outpoint),
                state
                    .coins
                    .get(outpoint)
                    .map(|c| bincode::serialize(&(outpoint, c)))
                    .transpose()?,
            ),
            UndoEntry::Token { id, .. } => (
                token_key(*id),
                state.tokens.get(*id).map(bincode::serialize).transpose()?,
            ),
            UndoEntry::TokenSymbol { symbol, .. } => (
                symbol_key(symbol),
                state
                    .tokens
                    .symbol_index()
                    .find(|(s, _)| *s == symbol)
                    .map(|(s, id)| bincode::serialize(&(s, id)))
                    .transpose()?,
            ),
            UndoEntry::TokenCreationTx { txid, .. } => (
                creation_key(txid),
                state
                    .tokens
                    .creation_index()
                    .find(|(t, _)| *t == txid)
                    .map(|(t, id)| bincode::serialize(&(t, id)))
                    .transpose()?,
            ),
            UndoEntry::NextTokenId { .. } => (
                vec![NEXT_ID],
                Some(bincode::serialize(&state.tokens.next_id())?),
            ),
            UndoEntry::Lock { outpoint, .. } => (
                outpoint_key(LOCK, outpoint),
                state
                    .locks
                    .get(outpoint)
                    .map(|l| bincode::serialize(&(outpoint, l)))
                    .transpose()?,
            ),
            UndoEntry::Balance { address, token, .. } => {
                let amount = state.balances.get(address, *token);
                let value = if amount == 0 {
                    None
                } else {
                    Some(bincode::serialize(&(address, token, &amount))?)
                };
                (balance_key(address, *token), value)
            }
            UndoEntry::Pool { id, .. } => (
                pool_key(*id),
                state.pools.get(*id).map(bincode::serialize).transpose()?,
            ),
            UndoEntry::PairIndex { pair, .. } => (
                pair_key(*pair),
                state
                    .pools
                    .pair_index()
                    .find(|(p, _)| *p == pair)
                    .map(|(p, id)| bincode::serialize(&(p, id)))
                    .transpose()?,
            ),
        };
        out.insert(key, value);
    }
    Ok(out)
}

/// Rebuild state from stored records (any order).
pub fn load_state<I>(records: I) -> bincode::Result<LedgerState>
where
    I: IntoIterator<Item = Record>,
{
    let mut state = LedgerState::new();
    for (key, value) in records {
        match key.first().copied() {
            Some(TOKEN) => state.tokens.insert_raw(bincode::deserialize::<Token>(&value)?),
            Some(SYMBOL) => {
                let (symbol, id): (String, DctId) = bincode::deserialize(&value)?;
                state.tokens.insert_symbol_raw(symbol, id);
            }
            Some(CREATION_TX) => {
                let (txid, id): (TxId, DctId) = bincode::deserialize(&value)?;
                state.tokens.insert_creation_tx_raw(txid, id);
            }
            Some(NEXT_ID) => state.tokens.set_next_id_raw(bincode::deserialize(&value)?),
            Some(LOCK) => {
                let (outpoint, lock): (OutPoint, CollateralLock) = bincode::deserialize(&value)?;
                state.locks.insert_raw(outpoint, lock);
            }
            Some(BALANCE) => {
                let (address, token, amount): (String, DctId, Amount) =
                    bincode::deserialize(&value)?;
                state.balances.insert_raw(address, token, amount);
            }
            Some(POOL) => state.pools.insert_raw(bincode::deserialize::<PoolPair>(&value)?),
            Some(PAIR) => {
                let (pair, id): ((DctId, DctId), DctId) = bincode::deserialize(&value)?;
                state.pools.insert_pair_raw(pair, id);
            }
            Some(UTXO) => {
                let (outpoint, coin): (OutPoint, Coin) = bincode::deserialize(&value)?;
                state.coins.insert_raw(outpoint, coin);
            }
            other => {
                return Err(Box::new(bincode::ErrorKind::Custom(format!(
                    "unknown state record prefix {:?}",
                    other
                ))))
            }
        }
    }
    Ok(state)
}
