//! Typed ledger operations carried by transactions.

use crate::amount::Amount;
use crate::primitives::{hash_str, DctId, Hash256, TxId};
use crate::tokens::Token;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Per-token amounts, sorted by token id.
pub type TokenBalances = BTreeMap<DctId, Amount>;

/// A token as named inside an operation: the txid that created it, or
/// `Hash256::NULL` for the native coin. Ids follow creation order and move
/// when a reorg reorders creations; creation txids do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenRef(pub TxId);

impl TokenRef {
    pub const NATIVE: TokenRef = TokenRef(Hash256::NULL);

    pub fn of(token: &Token) -> Self {
        TokenRef(token.creation_tx)
    }

    pub fn is_native(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TokenRef)
    }
}

// Hex string so token refs can key JSON objects.
impl Serialize for TokenRef {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenRef {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Per-token amounts inside an operation.
pub type TokenAmounts = BTreeMap<TokenRef, Amount>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomTx {
    /// Output 0 of the carrying transaction is the collateral.
    CreateToken {
        symbol: String,
        name: String,
        collateral_address: String,
    },
    DestroyToken {
        token: TokenRef,
    },
    /// Credits each token's collateral address.
    MintTokens {
        amounts: TokenAmounts,
    },
    AccountToAccount {
        from: String,
        to: BTreeMap<String, TokenAmounts>,
    },
    CreatePoolPair {
        token_a: TokenRef,
        token_b: TokenRef,
        /// COIN-scaled fraction, below 1.
        commission: Amount,
        owner_fee_address: String,
        status: bool,
        pair_symbol: Option<String>,
    },
    AddPoolLiquidity {
        from: BTreeMap<String, TokenAmounts>,
        share_address: String,
    },
    /// `pool` names the pool's share token.
    RemovePoolLiquidity {
        from: String,
        pool: TokenRef,
        amount: Amount,
    },
    PoolSwap {
        from: String,
        token_from: TokenRef,
        amount_from: Amount,
        to: String,
        token_to: TokenRef,
    },
}

impl CustomTx {
    pub fn name(&self) -> &'static str {
        match self {
            CustomTx::CreateToken { .. } => "CreateToken",
            CustomTx::DestroyToken { .. } => "DestroyToken",
            CustomTx::MintTokens { .. } => "MintTokens",
            CustomTx::AccountToAccount { .. } => "AccountToAccount",
            CustomTx::CreatePoolPair { .. } => "CreatePoolPair",
            CustomTx::AddPoolLiquidity { .. } => "AddPoolLiquidity",
            CustomTx::RemovePoolLiquidity { .. } => "RemovePoolLiquidity",
            CustomTx::PoolSwap { .. } => "PoolSwap",
        }
    }

    fn type_byte(&self) -> u8 {
        match self {
            CustomTx::CreateToken { .. } => b'T',
            CustomTx::DestroyToken { .. } => b'D',
            CustomTx::MintTokens { .. } => b'M',
            CustomTx::AccountToAccount { .. } => b'B',
            CustomTx::CreatePoolPair { .. } => b'p',
            CustomTx::AddPoolLiquidity { .. } => b'l',
            CustomTx::RemovePoolLiquidity { .. } => b'r',
            CustomTx::PoolSwap { .. } => b's',
        }
    }

    pub(crate) fn hash_into(&self, hasher: &mut Sha3_256) {
        hasher.update([self.type_byte()]);

        match self {
            CustomTx::CreateToken {
                symbol,
                name,
                collateral_address,
            } => {
                hash_str(hasher, symbol);
                hash_str(hasher, name);
                hash_str(hasher, collateral_address);
            }
            CustomTx::DestroyToken { token } => hasher.update(token.as_bytes()),
            CustomTx::MintTokens { amounts } => hash_balances(hasher, amounts),
            CustomTx::AccountToAccount { from, to } => {
                hash_str(hasher, from);
                hash_accounts(hasher, to);
            }
            CustomTx::CreatePoolPair {
                token_a,
                token_b,
                commission,
                owner_fee_address,
                status,
                pair_symbol,
            } => {
                hasher.update(token_a.as_bytes());
                hasher.update(token_b.as_bytes());
                hasher.update(commission.to_le_bytes());
                hash_str(hasher, owner_fee_address);
                hasher.update([*status as u8]);
                match pair_symbol {
                    Some(symbol) => {
                        hasher.update([1u8]);
                        hash_str(hasher, symbol);
                    }
                    None => hasher.update([0u8]),
                }
            }
            CustomTx::AddPoolLiquidity {
                from,
                share_address,
            } => {
                hash_accounts(hasher, from);
                hash_str(hasher, share_address);
            }
            CustomTx::RemovePoolLiquidity { from, pool, amount } => {
                hash_str(hasher, from);
                hasher.update(pool.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
            CustomTx::PoolSwap {
                from,
                token_from,
                amount_from,
                to,
                token_to,
            } => {
                hash_str(hasher, from);
                hasher.update(token_from.as_bytes());
                hasher.update(amount_from.to_le_bytes());
                hash_str(hasher, to);
                hasher.update(token_to.as_bytes());
            }
        }
    }
}

fn hash_balances(hasher: &mut Sha3_256, balances: &TokenAmounts) {
    hasher.update((balances.len() as u64).to_le_bytes());
    for (token, amount) in balances {
        hasher.update(token.as_bytes());
        hasher.update(amount.to_le_bytes());
    }
}

fn hash_accounts(hasher: &mut Sha3_256, accounts: &BTreeMap<String, TokenAmounts>) {
    hasher.update((accounts.len() as u64).to_le_bytes());
    for (address, balances) in accounts {
        hash_str(hasher, address);
        hash_balances(hasher, balances);
    }
}
