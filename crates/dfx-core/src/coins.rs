//! UTXO set.

use crate::error::{InvariantViolation, LedgerError};
use crate::primitives::{OutPoint, TxOut};
use crate::undo::{restore_slot, Journal, UndoEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub out: TxOut,
    /// Height of the block (or, in a mempool view, the pending height) that created it.
    pub height: u64,
    pub is_coinbase: bool,
}

impl Coin {
    /// Consensus rule: a coinbase output is spendable in a block at least
    /// `maturity` blocks above its own.
    pub fn is_mature(&self, spend_height: u64, maturity: u64) -> bool {
        !self.is_coinbase || spend_height.saturating_sub(self.height) >= maturity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinsView {
    coins: BTreeMap<OutPoint, Coin>,
}

impl CoinsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.coins.contains_key(outpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &Coin)> {
        self.coins.iter()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn add(&mut self, outpoint: OutPoint, coin: Coin, journal: &mut Journal) {
        let prior = self.coins.insert(outpoint, coin);
        journal.record(UndoEntry::Coin { outpoint, prior });
    }

    pub fn spend(&mut self, outpoint: &OutPoint, journal: &mut Journal) -> Result<Coin, LedgerError> {
        let coin = self.coins.remove(outpoint).ok_or_else(|| {
            LedgerError::BadTransaction("bad-txns-inputs-missingorspent".to_string())
        })?;
        journal.record(UndoEntry::Coin {
            outpoint: *outpoint,
            prior: Some(coin.clone()),
        });
        Ok(coin)
    }

    pub(crate) fn restore(
        &mut self,
        outpoint: OutPoint,
        prior: Option<Coin>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.coins, outpoint, prior, "coin")
    }

    pub(crate) fn insert_raw(&mut self, outpoint: OutPoint, coin: Coin) {
        self.coins.insert(outpoint, coin);
    }
}
