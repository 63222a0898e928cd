// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - COLLATERAL LOCK MANAGER
//
// Tracks UTXOs pledged as token creation collateral.
// - mempool-locked: creation seen only in the mempool
// - confirmed-locked: creation connected in a block
// - released: token destruction confirmed, output spendable again
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::{InvariantViolation, LedgerError};
use crate::primitives::{DctId, OutPoint};
use crate::undo::{restore_slot, Journal, UndoEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    MempoolLocked,
    ConfirmedLocked,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLock {
    pub owner: DctId,
    pub state: LockState,
}

impl CollateralLock {
    pub fn is_active(&self) -> bool {
        self.state != LockState::Released
    }
}

/// Whether state is being built for the mempool view or for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Mempool,
    Block,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollateralLocks {
    locks: BTreeMap<OutPoint, CollateralLock>,
}

impl CollateralLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&CollateralLock> {
        self.locks.get(outpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &CollateralLock)> {
        self.locks.iter()
    }

    pub fn lock(
        &mut self,
        outpoint: OutPoint,
        owner: DctId,
        mode: ApplyMode,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        if self.locks.get(&outpoint).is_some_and(|l| l.is_active()) {
            return Err(LedgerError::AlreadyLocked(outpoint));
        }
        let state = match mode {
            ApplyMode::Mempool => LockState::MempoolLocked,
            ApplyMode::Block => LockState::ConfirmedLocked,
        };
        let prior = self
            .locks
            .insert(outpoint, CollateralLock { owner, state });
        journal.record(UndoEntry::Lock { outpoint, prior });
        Ok(())
    }

    /// Release the lock held by `owner` on `outpoint`.
    pub fn release(
        &mut self,
        outpoint: &OutPoint,
        owner: DctId,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let lock = match self.locks.get_mut(outpoint) {
            Some(lock) if lock.owner == owner => lock,
            _ => {
                return Err(LedgerError::NotFound(format!(
                    "no collateral lock of token {} on {}",
                    owner, outpoint
                )))
            }
        };
        let prior = lock.clone();
        lock.state = LockState::Released;
        journal.record(UndoEntry::Lock {
            outpoint: *outpoint,
            prior: Some(prior),
        });
        Ok(())
    }

    /// Reject spending a still-locked collateral output.
    pub fn check_spend(&self, outpoint: &OutPoint) -> Result<(), LedgerError> {
        match self.locks.get(outpoint).map(|l| l.state) {
            Some(LockState::MempoolLocked) => Err(LedgerError::CollateralLockedInMempool(*outpoint)),
            Some(LockState::ConfirmedLocked) => Err(LedgerError::CollateralLocked(*outpoint)),
            Some(LockState::Released) | None => Ok(()),
        }
    }

    pub(crate) fn restore(
        &mut self,
        outpoint: OutPoint,
        prior: Option<CollateralLock>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.locks, outpoint, prior, "collateral lock")
    }

    pub(crate) fn insert_raw(&mut self, outpoint: OutPoint, lock: CollateralLock) {
        self.locks.insert(outpoint, lock);
    }
}
