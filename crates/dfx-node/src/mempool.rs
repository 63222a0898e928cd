// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - TRANSACTION MEMPOOL
//
// Pending transactions in admission order, validated against a view:
// the chain tip state with every pending transaction applied on top
// (mempool lock semantics).
// - Duplicate and conflicting-spend rejection
// - Size cap
// - Replay queue after blocks connect or disconnect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dfx_core::{
    ApplyMode, ChainParams, Journal, LedgerError, LedgerState, OutPoint, Transaction, TxId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolEntry {
    /// Admission sequence, monotonic across rebuilds
    pub seq: u64,
    pub txid: TxId,
    pub tx: Transaction,
}

#[derive(Debug, Clone)]
pub struct Mempool {
    entries: BTreeMap<u64, MempoolEntry>,
    by_txid: BTreeMap<TxId, u64>,
    /// Outpoint -> spending mempool tx
    spent: BTreeMap<OutPoint, TxId>,
    view: LedgerState,
    /// Height pending transactions are validated at (tip + 1)
    next_height: u64,
    next_seq: u64,
    max_size: usize,

    /// Statistics
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_evicted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolStats {
    pub size: usize,
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_evicted: u64,
}

impl Mempool {
    pub fn new(tip_state: &LedgerState, tip_height: u64, max_size: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_txid: BTreeMap::new(),
            spent: BTreeMap::new(),
            view: tip_state.clone(),
            next_height: tip_height + 1,
            next_seq: 0,
            max_size,
            total_received: 0,
            total_accepted: 0,
            total_rejected: 0,
            total_evicted: 0,
        }
    }

    /// Validate `tx` against the view and admit it.
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        params: &ChainParams,
    ) -> Result<TxId, LedgerError> {
        self.total_received += 1;
        match self.admit(tx, params) {
            Ok(txid) => {
                self.total_accepted += 1;
                log::debug!("mempool accepted {}", txid);
                Ok(txid)
            }
            Err(e) => {
                self.total_rejected += 1;
                log::debug!("mempool rejected tx: {}", e);
                Err(e)
            }
        }
    }

    fn admit(&mut self, tx: Transaction, params: &ChainParams) -> Result<TxId, LedgerError> {
        let txid = tx.txid();
        if self.by_txid.contains_key(&txid) {
            return Err(LedgerError::BadTransaction(
                "txn-already-in-mempool".to_string(),
            ));
        }
        if self.entries.len() >= self.max_size {
            return Err(LedgerError::BadTransaction("mempool-full".to_string()));
        }
        if tx.inputs.iter().any(|input| self.spent.contains_key(input)) {
            return Err(LedgerError::BadTransaction(
                "txn-mempool-conflict".to_string(),
            ));
        }

        // the view is never reverted, so the journal is only scratch
        let mut journal = Journal::new();
        self.view.apply_transaction(
            &tx,
            self.next_height,
            ApplyMode::Mempool,
            params,
            &mut journal,
        )?;

        for input in &tx.inputs {
            self.spent.insert(*input, txid);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_txid.insert(txid, seq);
        self.entries.insert(seq, MempoolEntry { seq, txid, tx });
        Ok(txid)
    }

    /// Reset the view to a new tip and re-validate `queue` in order.
    /// Transactions that no longer apply are dropped. Returns the drops.
    pub fn rebuild(
        &mut self,
        tip_state: &LedgerState,
        tip_height: u64,
        queue: Vec<Transaction>,
        params: &ChainParams,
    ) -> Vec<TxId> {
        self.entries.clear();
        self.by_txid.clear();
        self.spent.clear();
        self.view = tip_state.clone();
        self.next_height = tip_height + 1;

        let mut dropped = Vec::new();
        for tx in queue {
            let txid = tx.txid();
            if self.by_txid.contains_key(&txid) {
                continue;
            }
            if let Err(e) = self.admit(tx, params) {
                log::warn!("mempool dropped {}: {}", txid, e);
                self.total_evicted += 1;
                dropped.push(txid);
            }
        }
        dropped
    }

    /// Pending transactions in admission order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.values().map(|e| &e.tx)
    }

    pub fn txids(&self) -> Vec<TxId> {
        self.entries.values().map(|e| e.txid).collect()
    }

    /// Tip state plus every pending transaction.
    pub fn view(&self) -> &LedgerState {
        &self.view
    }

    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            size: self.entries.len(),
            total_received: self.total_received,
            total_accepted: self.total_accepted,
            total_rejected: self.total_rejected,
            total_evicted: self.total_evicted,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
