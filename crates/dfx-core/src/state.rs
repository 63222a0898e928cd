// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - LEDGER STATE
//
// The full deterministic state of one chain tip:
// coins → tokens → collateral locks → balances → pool pairs.
// Transactions mutate it through the components in that order, each mutation
// journaled so a block (or a single failed transaction) can be reverted.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::{money_range, Amount, COIN};
use crate::balances::BalanceLedger;
use crate::coins::{Coin, CoinsView};
use crate::collateral::{ApplyMode, CollateralLocks, LockState};
use crate::error::{InvariantViolation, LedgerError};
use crate::pool::PoolRegistry;
use crate::primitives::{hash_str, Block, OutPoint, Transaction, TxId};
use crate::tokens::TokenRegistry;
use crate::undo::{BlockUndo, Journal, UndoEntry};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeSet;

/// Consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Blocks before a coinbase output may be spent
    pub coinbase_maturity: u64,
    /// Max value of a block's coinbase
    pub block_reward: Amount,
    /// Value output 0 of a token creation must carry
    pub token_collateral: Amount,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            coinbase_maturity: 100,
            block_reward: 50 * COIN,
            token_collateral: 10 * COIN,
        }
    }
}

/// What a custom operation may see about its carrying transaction.
pub(crate) struct TxContext<'a> {
    pub txid: TxId,
    pub height: u64,
    pub mode: ApplyMode,
    /// Owners of the spent inputs
    pub auth: &'a BTreeSet<String>,
    pub tx: &'a Transaction,
    pub params: &'a ChainParams,
}

impl TxContext<'_> {
    pub fn require_auth(&self, address: &str) -> Result<(), LedgerError> {
        if self.auth.contains(address) {
            Ok(())
        } else {
            Err(LedgerError::AuthorizationFailed(format!(
                "tx must have at least one input from {}. Are you an owner?",
                address
            )))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub coins: CoinsView,
    pub tokens: TokenRegistry,
    pub locks: CollateralLocks,
    pub balances: BalanceLedger,
    pub pools: PoolRegistry,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply one transaction at `height`. On error every
    /// mutation it made is rolled back and the journal is left as it was.
    pub fn apply_transaction(
        &mut self,
        tx: &Transaction,
        height: u64,
        mode: ApplyMode,
        params: &ChainParams,
        journal: &mut Journal,
    ) -> Result<TxId, LedgerError> {
        let mark = journal.mark();
        match self.apply_transaction_inner(tx, height, mode, params, journal) {
            Ok(txid) => Ok(txid),
            Err(err) => {
                let tail = journal.split_off(mark);
                self.revert_entries(tail)?;
                Err(err)
            }
        }
    }

    fn apply_transaction_inner(
        &mut self,
        tx: &Transaction,
        height: u64,
        mode: ApplyMode,
        params: &ChainParams,
        journal: &mut Journal,
    ) -> Result<TxId, LedgerError> {
        let txid = tx.txid();
        let bad = |reason: &str| LedgerError::BadTransaction(reason.to_string());

        let value_out = tx
            .total_out()
            .filter(|v| money_range(*v))
            .ok_or_else(|| bad("bad-txns-txouttotal-toolarge"))?;

        if let Some(cb_height) = tx.coinbase_height {
            if mode == ApplyMode::Mempool {
                return Err(bad("coinbase"));
            }
            if !tx.inputs.is_empty() || tx.op.is_some() {
                return Err(bad("bad-cb-format"));
            }
            if cb_height != height {
                return Err(bad("bad-cb-height"));
            }
            if value_out > params.block_reward {
                return Err(bad("bad-cb-amount"));
            }
            self.add_outputs(tx, txid, height, true, journal);
            return Ok(txid);
        }

        if tx.inputs.is_empty() {
            return Err(bad("bad-txns-vin-empty"));
        }
        let unique: BTreeSet<&OutPoint> = tx.inputs.iter().collect();
        if unique.len() != tx.inputs.len() {
            return Err(bad("bad-txns-inputs-duplicate"));
        }

        let mut value_in: Amount = 0;
        let mut auth = BTreeSet::new();
        for input in &tx.inputs {
            let coin = self
                .coins
                .get(input)
                .ok_or_else(|| bad("bad-txns-inputs-missingorspent"))?;
            if !coin.is_mature(height, params.coinbase_maturity) {
                return Err(bad("bad-txns-premature-spend-of-coinbase"));
            }
            self.locks.check_spend(input)?;
            value_in = value_in
                .checked_add(coin.out.value)
                .filter(|v| money_range(*v))
                .ok_or_else(|| bad("bad-txns-inputvalues-outofrange"))?;
            auth.insert(coin.out.address.clone());
        }
        if value_in < value_out {
            return Err(bad("bad-txns-in-belowout"));
        }

        for input in &tx.inputs {
            self.coins.spend(input, journal)?;
        }
        self.add_outputs(tx, txid, height, false, journal);

        if let Some(op) = &tx.op {
            let ctx = TxContext {
                txid,
                height,
                mode,
                auth: &auth,
                tx,
                params,
            };
            self.apply_op(op, &ctx, journal)?;
        }
        Ok(txid)
    }

    fn add_outputs(
        &mut self,
        tx: &Transaction,
        txid: TxId,
        height: u64,
        is_coinbase: bool,
        journal: &mut Journal,
    ) {
        for (vout, out) in tx.outputs.iter().enumerate() {
            self.coins.add(
                OutPoint::new(txid, vout as u32),
                Coin {
                    out: out.clone(),
                    height,
                    is_coinbase,
                },
                journal,
            );
        }
    }

    /// Apply every transaction of `block` on top of this state.
    /// On error the state is unchanged.
    pub fn connect_block(
        &mut self,
        block: &Block,
        params: &ChainParams,
    ) -> Result<BlockUndo, LedgerError> {
        let mut journal = Journal::new();
        let mut result = Ok(());
        for (index, tx) in block.txs.iter().enumerate() {
            if index == 0 && !tx.is_coinbase() {
                result = Err(LedgerError::BadTransaction("bad-cb-missing".to_string()));
                break;
            }
            if index > 0 && tx.is_coinbase() {
                result = Err(LedgerError::BadTransaction("bad-cb-multiple".to_string()));
                break;
            }
            if let Err(err) =
                self.apply_transaction(tx, block.height, ApplyMode::Block, params, &mut journal)
            {
                result = Err(err);
                break;
            }
        }

        if let Err(err) = result {
            self.revert_entries(journal.into_entries())?;
            return Err(err);
        }

        Ok(BlockUndo {
            height: block.height,
            block_hash: block.hash(),
            entries: journal.into_entries(),
        })
    }

    /// Revert one block. Applied to a copy and swapped in only when every
    /// entry reverted cleanly.
    pub fn disconnect_block(&mut self, undo: &BlockUndo) -> Result<(), InvariantViolation> {
        let mut next = self.clone();
        next.revert_entries(undo.entries.iter().cloned())?;
        *self = next;
        Ok(())
    }

    /// Apply undo entries newest first.
    pub fn revert_entries<I>(&mut self, entries: I) -> Result<(), InvariantViolation>
    where
        I: IntoIterator<Item = UndoEntry>,
        I::IntoIter: DoubleEndedIterator,
    {
        for entry in entries.into_iter().rev() {
            match entry {
                UndoEntry::Coin { outpoint, prior } => self.coins.restore(outpoint, prior)?,
                UndoEntry::Token { id, prior } => self.tokens.restore_token(id, prior)?,
                UndoEntry::TokenSymbol { symbol, prior } => {
                    self.tokens.restore_symbol(symbol, prior)?
                }
                UndoEntry::TokenCreationTx { txid, prior } => {
                    self.tokens.restore_creation_tx(txid, prior)?
                }
                UndoEntry::NextTokenId { prior } => self.tokens.restore_next_id(prior)?,
                UndoEntry::Lock { outpoint, prior } => self.locks.restore(outpoint, prior)?,
                UndoEntry::Balance {
                    address,
                    token,
                    prior,
                } => self.balances.restore(address, token, prior)?,
                UndoEntry::Pool { id, prior } => self.pools.restore_pool(id, prior)?,
                UndoEntry::PairIndex { pair, prior } => self.pools.restore_pair(pair, prior)?,
            }
        }
        Ok(())
    }

    /// Supply audit: for every token, balances plus pool reserves equal the
    /// minted total; for every pool, outstanding shares equal its liquidity.
    pub fn audit_supply(&self) -> Result<(), InvariantViolation> {
        for (id, token) in self.tokens.iter() {
            if token.is_lps {
                let pool = self.pools.get(*id).ok_or_else(|| {
                    InvariantViolation(format!("share token {} has no pool", id))
                })?;
                let shares = self.balances.total(*id);
                if shares != pool.total_liquidity {
                    return Err(InvariantViolation(format!(
                        "pool {} shares {} != total liquidity {}",
                        id, shares, pool.total_liquidity
                    )));
                }
                continue;
            }
            let reserves: Amount = self
                .pools
                .iter()
                .map(|(_, p)| {
                    if p.token_a == *id {
                        p.reserve_a
                    } else if p.token_b == *id {
                        p.reserve_b
                    } else {
                        0
                    }
                })
                .sum();
            let held = self.balances.total(*id) + reserves;
            if held != token.minted {
                return Err(InvariantViolation(format!(
                    "token {} supply {} != minted {}",
                    token.symbol, held, token.minted
                )));
            }
        }
        Ok(())
    }

    /// SHA3-256 over every table in key order.
    pub fn state_root(&self) -> String {
        let mut hasher = Sha3_256::new();

        hasher.update(b"tokens");
        for (id, t) in self.tokens.iter() {
            hasher.update(id.to_le_bytes());
            hash_str(&mut hasher, &t.symbol);
            hash_str(&mut hasher, &t.name);
            hash_str(&mut hasher, t.collateral_address.as_deref().unwrap_or(""));
            hasher.update(t.creation_tx.0);
            hasher.update(t.creation_height.to_le_bytes());
            hasher.update(t.destruction_tx.0);
            hasher.update(t.destruction_height.to_le_bytes());
            hasher.update(t.minted.to_le_bytes());
            hasher.update([t.is_lps as u8]);
        }
        for (symbol, id) in self.tokens.symbol_index() {
            hash_str(&mut hasher, symbol);
            hasher.update(id.to_le_bytes());
        }
        for (txid, id) in self.tokens.creation_index() {
            hasher.update(txid.0);
            hasher.update(id.to_le_bytes());
        }
        hasher.update(self.tokens.next_id().to_le_bytes());

        hasher.update(b"locks");
        for (outpoint, lock) in self.locks.iter() {
            hasher.update(outpoint.txid.0);
            hasher.update(outpoint.vout.to_le_bytes());
            hasher.update(lock.owner.to_le_bytes());
            let state_byte = match lock.state {
                LockState::MempoolLocked => 0u8,
                LockState::ConfirmedLocked => 1,
                LockState::Released => 2,
            };
            hasher.update([state_byte]);
        }

        hasher.update(b"balances");
        for (address, balances) in self.balances.iter() {
            hash_str(&mut hasher, address);
            for (token, amount) in balances {
                hasher.update(token.to_le_bytes());
                hasher.update(amount.to_le_bytes());
            }
        }

        hasher.update(b"pools");
        for (id, p) in self.pools.iter() {
            hasher.update(id.to_le_bytes());
            hasher.update(p.token_a.to_le_bytes());
            hasher.update(p.token_b.to_le_bytes());
            hasher.update([p.reversed as u8, p.status as u8]);
            hasher.update(p.reserve_a.to_le_bytes());
            hasher.update(p.reserve_b.to_le_bytes());
            hasher.update(p.total_liquidity.to_le_bytes());
            hasher.update(p.commission.to_le_bytes());
            hash_str(&mut hasher, &p.owner_fee_address);
            hash_str(&mut hasher, &p.symbol);
            hasher.update(p.creation_tx.0);
            hasher.update(p.creation_height.to_le_bytes());
        }
        for ((a, b), id) in self.pools.pair_index() {
            hasher.update(a.to_le_bytes());
            hasher.update(b.to_le_bytes());
            hasher.update(id.to_le_bytes());
        }

        hasher.update(b"coins");
        for (outpoint, coin) in self.coins.iter() {
            hasher.update(outpoint.txid.0);
            hasher.update(outpoint.vout.to_le_bytes());
            hash_str(&mut hasher, &coin.out.address);
            hasher.update(coin.out.value.to_le_bytes());
            hasher.update(coin.height.to_le_bytes());
            hasher.update([coin.is_coinbase as u8]);
        }

        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::CustomTx;
    use crate::primitives::{Hash256, TxOut};

    const MINER: &str = "dfxminer";

    fn params() -> ChainParams {
        ChainParams {
            coinbase_maturity: 2,
            ..ChainParams::default()
        }
    }

    /// State with `n` connected coinbase-only blocks paying MINER.
    fn mined(n: u64) -> (LedgerState, Vec<BlockUndo>) {
        let mut state = LedgerState::new();
        let mut undos = Vec::new();
        let mut prev = Block::genesis().hash();
        for height in 1..=n {
            let block = Block {
                height,
                prev_hash: prev,
                time: height,
                txs: vec![Transaction::coinbase(height, MINER, 50 * COIN)],
            };
            prev = block.hash();
            undos.push(state.connect_block(&block, &params()).unwrap());
        }
        (state, undos)
    }

    fn coinbase_outpoint(height: u64) -> OutPoint {
        OutPoint::new(Transaction::coinbase(height, MINER, 50 * COIN).txid(), 0)
    }

    fn create_gold(input: OutPoint) -> Transaction {
        Transaction {
            inputs: vec![input],
            outputs: vec![TxOut::new(MINER, 10 * COIN), TxOut::new(MINER, 40 * COIN)],
            op: Some(CustomTx::CreateToken {
                symbol: "GOLD".to_string(),
                name: "shiny gold".to_string(),
                collateral_address: MINER.to_string(),
            }),
            coinbase_height: None,
        }
    }

    #[test]
    fn test_premature_coinbase_spend() {
        let (mut state, _) = mined(2);
        let mut journal = Journal::new();
        let err = state
            .apply_transaction(
                &create_gold(coinbase_outpoint(1)),
                2,
                ApplyMode::Block,
                &params(),
                &mut journal,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "bad-txns-premature-spend-of-coinbase");
        assert!(journal.is_empty());
    }

    #[test]
    fn test_create_token_locks_collateral() {
        let (mut state, _) = mined(3);
        let mut journal = Journal::new();
        let tx = create_gold(coinbase_outpoint(1));
        let txid = state
            .apply_transaction(&tx, 4, ApplyMode::Mempool, &params(), &mut journal)
            .unwrap();
        assert_eq!(state.tokens.get(128).unwrap().creation_tx, txid);

        let spend = Transaction {
            inputs: vec![OutPoint::new(txid, 0)],
            outputs: vec![TxOut::new(MINER, 999_900_000)],
            op: None,
            coinbase_height: None,
        };
        let err = state
            .apply_transaction(&spend, 4, ApplyMode::Mempool, &params(), &mut journal)
            .unwrap_err();
        assert!(err.to_string().starts_with("collateral-locked-in-mempool,"));
    }

    #[test]
    fn test_failed_op_rolls_back_inputs() {
        let (mut state, _) = mined(3);
        let before = state.clone();
        let mut journal = Journal::new();
        let mut tx = create_gold(coinbase_outpoint(1));
        tx.outputs[0].value = COIN; // below collateral
        let err = state
            .apply_transaction(&tx, 4, ApplyMode::Block, &params(), &mut journal)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds(_)));
        assert_eq!(state, before);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_disconnect_restores_state_root() {
        let (mut state, _) = mined(3);
        let root = state.state_root();
        let tip = Block {
            height: 4,
            prev_hash: Hash256::NULL,
            time: 4,
            txs: vec![
                Transaction::coinbase(4, MINER, 50 * COIN),
                create_gold(coinbase_outpoint(1)),
            ],
        };
        let undo = state.connect_block(&tip, &params()).unwrap();
        assert_ne!(state.state_root(), root);
        assert_eq!(state.tokens.len(), 2);

        state.disconnect_block(&undo).unwrap();
        assert_eq!(state.state_root(), root);
        assert_eq!(state.tokens.len(), 1);
        assert_eq!(state.tokens.next_id(), 128);
    }

    #[test]
    fn test_bad_block_leaves_state_untouched() {
        let (mut state, _) = mined(3);
        let before = state.clone();
        let block = Block {
            height: 4,
            prev_hash: Hash256::NULL,
            time: 4,
            txs: vec![
                Transaction::coinbase(4, MINER, 50 * COIN),
                create_gold(coinbase_outpoint(1)),
                create_gold(coinbase_outpoint(1)),
            ],
        };
        assert!(state.connect_block(&block, &params()).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_coinbase_rules() {
        let (mut state, _) = mined(1);
        let greedy = Block {
            height: 2,
            prev_hash: Hash256::NULL,
            time: 2,
            txs: vec![Transaction::coinbase(2, MINER, 51 * COIN)],
        };
        assert_eq!(
            state.connect_block(&greedy, &params()).unwrap_err().to_string(),
            "bad-cb-amount"
        );
        let mut journal = Journal::new();
        let err = state
            .apply_transaction(
                &Transaction::coinbase(2, MINER, COIN),
                2,
                ApplyMode::Mempool,
                &params(),
                &mut journal,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "coinbase");
    }

    #[test]
    fn test_corrupt_undo_is_invariant_violation() {
        let (mut state, undos) = mined(1);
        state.disconnect_block(&undos[0]).unwrap();
        let before = state.clone();
        // second disconnect of the same block references a coin that is gone
        assert!(state.disconnect_block(&undos[0]).is_err());
        assert_eq!(state, before);
    }
}
