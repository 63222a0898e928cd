// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - CORE MODULE
//
// Deterministic token & pool-pair ledger on top of a UTXO chain.
// Tokens, collateral locks, account balances and constant-product pools are
// mutated only through journaled operations so any block can be disconnected
// and every node reaches the same state root from the same history.
// All arithmetic is u128 fixed point (8 decimals), no floating point.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod amount;
mod apply;
pub mod balances;
pub mod coins;
pub mod collateral;
pub mod error;
pub mod liquidity;
pub mod ops;
pub mod pool;
pub mod primitives;
pub mod state;
pub mod store;
pub mod tokens;
pub mod undo;

pub use amount::{format_amount, parse_amount, Amount, TokenAmount, COIN, MAX_MONEY};
pub use collateral::{ApplyMode, LockState};
pub use error::{InvariantViolation, LedgerError};
pub use ops::{CustomTx, TokenAmounts, TokenBalances, TokenRef};
pub use pool::PoolPair;
pub use primitives::{
    Block, BlockHash, DctId, Hash256, OutPoint, Transaction, TxId, TxOut, DCT_ID_START,
    NATIVE_SYMBOL, NATIVE_TOKEN_ID,
};
pub use state::{ChainParams, LedgerState};
pub use tokens::Token;
pub use undo::{BlockUndo, Journal, UndoEntry};
