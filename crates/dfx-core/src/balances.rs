//! Per-address, per-token balances (account model on top of the UTXO chain).
//!
//! Liquidity shares are ordinary balances of a pool's share token.

use crate::amount::{format_amount, money_range, Amount};
use crate::error::{InvariantViolation, LedgerError};
use crate::ops::TokenBalances;
use crate::primitives::DctId;
use crate::undo::{Journal, UndoEntry};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceLedger {
    accounts: BTreeMap<String, TokenBalances>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str, token: DctId) -> Amount {
        self.accounts
            .get(address)
            .and_then(|b| b.get(&token))
            .copied()
            .unwrap_or(0)
    }

    pub fn account(&self, address: &str) -> Option<&TokenBalances> {
        self.accounts.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TokenBalances)> {
        self.accounts.iter()
    }

    /// Sum of all balances of `token`.
    pub fn total(&self, token: DctId) -> Amount {
        self.accounts
            .values()
            .filter_map(|b| b.get(&token))
            .sum()
    }

    pub fn credit(
        &mut self,
        address: &str,
        token: DctId,
        amount: Amount,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let current = self.get(address, token);
        let next = current
            .checked_add(amount)
            .filter(|v| money_range(*v))
            .ok_or_else(|| LedgerError::AmountOutOfRange("Amount out of range".to_string()))?;
        self.set(address, token, next, journal);
        Ok(())
    }

    pub fn debit(
        &mut self,
        address: &str,
        token: DctId,
        amount: Amount,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let current = self.get(address, token);
        if current < amount {
            return Err(LedgerError::AmountOutOfRange(format!(
                "Amount {} is less than {}",
                format_amount(current),
                format_amount(amount)
            )));
        }
        self.set(address, token, current - amount, journal);
        Ok(())
    }

    /// Move `amounts` from `from` to each recipient.
    pub fn transfer(
        &mut self,
        from: &str,
        to: &BTreeMap<String, TokenBalances>,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let mut totals: TokenBalances = BTreeMap::new();
        for balances in to.values() {
            for (token, amount) in balances {
                let sum = totals.entry(*token).or_insert(0);
                *sum = sum
                    .checked_add(*amount)
                    .ok_or_else(|| LedgerError::AmountOutOfRange("Amount out of range".to_string()))?;
            }
        }
        for (token, amount) in &totals {
            self.debit(from, *token, *amount, journal)?;
        }
        for (address, balances) in to {
            for (token, amount) in balances {
                self.credit(address, *token, *amount, journal)?;
            }
        }
        Ok(())
    }

    fn set(&mut self, address: &str, token: DctId, value: Amount, journal: &mut Journal) {
        let balances = self.accounts.entry(address.to_string()).or_default();
        let prior = if value == 0 {
            balances.remove(&token)
        } else {
            balances.insert(token, value)
        };
        if balances.is_empty() {
            self.accounts.remove(address);
        }
        journal.record(UndoEntry::Balance {
            address: address.to_string(),
            token,
            prior,
        });
    }

    pub(crate) fn restore(
        &mut self,
        address: String,
        token: DctId,
        prior: Option<Amount>,
    ) -> Result<(), InvariantViolation> {
        match prior {
            Some(value) => {
                self.accounts.entry(address).or_default().insert(token, value);
            }
            None => {
                let balances = self.accounts.get_mut(&address).ok_or_else(|| {
                    InvariantViolation(format!("undo references missing account {}", address))
                })?;
                if balances.remove(&token).is_none() {
                    return Err(InvariantViolation(format!(
                        "undo references missing balance {}@{}",
                        token, address
                    )));
                }
                if balances.is_empty() {
                    self.accounts.remove(&address);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn insert_raw(&mut self, address: String, token: DctId, value: Amount) {
        if value > 0 {
            self.accounts.entry(address).or_default().insert(token, value);
        }
    }
}
