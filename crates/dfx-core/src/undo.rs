// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - UNDO JOURNAL
//
// Every mutation of ledger state records (entity, key, prior value) here
// before it is applied. Replaying a block's entries in reverse restores the
// exact pre-block state; the same journal rolls back a single failed
// transaction to a mark.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::Amount;
use crate::coins::Coin;
use crate::collateral::CollateralLock;
use crate::pool::PoolPair;
use crate::primitives::{BlockHash, DctId, OutPoint, TxId};
use crate::tokens::Token;
use crate::error::InvariantViolation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior value of one entity slot. `None` means the slot was empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoEntry {
    Coin {
        outpoint: OutPoint,
        prior: Option<Coin>,
    },
    Token {
        id: DctId,
        prior: Option<Token>,
    },
    TokenSymbol {
        symbol: String,
        prior: Option<DctId>,
    },
    TokenCreationTx {
        txid: TxId,
        prior: Option<DctId>,
    },
    NextTokenId {
        prior: DctId,
    },
    Lock {
        outpoint: OutPoint,
        prior: Option<CollateralLock>,
    },
    Balance {
        address: String,
        token: DctId,
        prior: Option<Amount>,
    },
    Pool {
        id: DctId,
        prior: Option<PoolPair>,
    },
    PairIndex {
        pair: (DctId, DctId),
        prior: Option<DctId>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<UndoEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Position to roll back to if the next transaction fails.
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    /// Detach everything recorded after `mark`, oldest first.
    pub fn split_off(&mut self, mark: usize) -> Vec<UndoEntry> {
        self.entries.split_off(mark.min(self.entries.len()))
    }

    pub fn into_entries(self) -> Vec<UndoEntry> {
        self.entries
    }
}

/// Undo log of one connected block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
    pub height: u64,
    pub block_hash: BlockHash,
    pub entries: Vec<UndoEntry>,
}

/// Put a slot back to its prior value. A slot recorded as previously empty
/// must exist now; anything else means the undo log and state diverged.
pub(crate) fn restore_slot<K, V>(
    map: &mut BTreeMap<K, V>,
    key: K,
    prior: Option<V>,
    what: &str,
) -> Result<(), InvariantViolation>
where
    K: Ord + std::fmt::Debug,
{
    match prior {
        Some(value) => {
            map.insert(key, value);
            Ok(())
        }
        None => match map.remove(&key) {
            Some(_) => Ok(()),
            None => Err(InvariantViolation(format!(
                "undo references missing {} {:?}",
                what, key
            ))),
        },
    }
}
