// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - NODE
//
// Chain, mempool and wallet behind one RwLock. Commands that mutate take the
// write lock; queries take the read lock and always see the confirmed tip.
// Block production, reorgs and tip invalidation are computed on a copy of the
// chain and swapped in whole, then the mempool is replayed against the new tip.
// An invariant violation or a failed commit halts the node.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::chain::Chain;
use crate::config::NodeConfig;
use crate::db::{ChainUpdate, LedgerDb, StoredChain};
use crate::error::NodeError;
use crate::mempool::{Mempool, MempoolStats};
use crate::rpc::{self, CreatePoolPairRequest, Pagination, PoolSwapRequest};
use crate::wallet::Wallet;
use dfx_core::{
    Amount, ApplyMode, Block, BlockHash, BlockUndo, ChainParams, CustomTx, DctId, Journal,
    LedgerError, LedgerState, Token, TokenAmount, TokenAmounts, TokenRef, Transaction, TxId,
    TxOut,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct NodeInner {
    chain: Chain,
    mempool: Mempool,
    wallet: Wallet,
}

pub struct Node {
    config: NodeConfig,
    inner: RwLock<NodeInner>,
    db: Option<LedgerDb>,
    halted: AtomicBool,
}

fn no_such_token(key: &str) -> LedgerError {
    LedgerError::NotFound(format!("Token {} does not exist", key))
}

impl NodeInner {
    fn fresh(config: &NodeConfig) -> Self {
        let chain = Chain::new(config.chain.params());
        let mempool = Mempool::new(chain.state(), chain.height(), config.mempool.max_size);
        Self {
            chain,
            mempool,
            wallet: Wallet::new(&config.node_id),
        }
    }

    fn restore(config: &NodeConfig, stored: StoredChain) -> Result<Self, NodeError> {
        let params = config.chain.params();
        let chain = Chain::from_parts(params.clone(), stored.blocks, stored.undos, stored.state)?;
        chain.state().audit_supply()?;
        let wallet = stored
            .wallet
            .unwrap_or_else(|| Wallet::new(&config.node_id));
        let mut mempool = Mempool::new(chain.state(), chain.height(), config.mempool.max_size);
        mempool.rebuild(chain.state(), chain.height(), stored.mempool, &params);
        log::info!(
            "restored chain at height {} with {} pending txs",
            chain.height(),
            mempool.len()
        );
        Ok(Self {
            chain,
            mempool,
            wallet,
        })
    }

    fn params(&self) -> ChainParams {
        self.chain.params().clone()
    }

    /// Re-validate the transactions of `disconnected` blocks (oldest first)
    /// followed by the current mempool against the tip. Transactions in
    /// `confirmed` are already in the chain.
    fn replay(&mut self, disconnected: &[Block], confirmed: &BTreeSet<TxId>) -> Vec<TxId> {
        let mut queue: Vec<Transaction> = disconnected
            .iter()
            .flat_map(|b| b.txs.iter().filter(|tx| !tx.is_coinbase()).cloned())
            .collect();
        queue.extend(self.mempool.transactions().cloned());
        queue.retain(|tx| !confirmed.contains(&tx.txid()));
        let params = self.params();
        self.mempool
            .rebuild(self.chain.state(), self.chain.height(), queue, &params)
    }

    /// Coinbase to the default address plus every mempool transaction that
    /// still applies, in admission order.
    fn mine_block(&mut self) -> Result<(Block, BlockUndo), NodeError> {
        let params = self.params();
        let height = self.chain.height() + 1;
        let coinbase =
            Transaction::coinbase(height, self.wallet.default_address(), params.block_reward);

        let mut trial = self.chain.state().clone();
        let mut journal = Journal::new();
        trial.apply_transaction(&coinbase, height, ApplyMode::Block, &params, &mut journal)?;
        let mut txs = vec![coinbase];
        for tx in self.mempool.transactions() {
            match trial.apply_transaction(tx, height, ApplyMode::Block, &params, &mut journal) {
                Ok(_) => txs.push(tx.clone()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => log::warn!("left {} out of block {}: {}", tx.txid(), height, e),
            }
        }

        let block = Block {
            height,
            prev_hash: self.chain.tip_hash(),
            time: height,
            txs,
        };
        let confirmed: BTreeSet<TxId> = block.txs.iter().map(|tx| tx.txid()).collect();
        self.chain.connect(block.clone())?;
        let undo = self
            .chain
            .undo(height)
            .cloned()
            .ok_or_else(|| NodeError::Fatal(format!("no undo record for block {}", height)))?;
        self.replay(&[], &confirmed);
        Ok((block, undo))
    }

    /// Switch to `blocks` (genesis first) if it is longer than the active
    /// chain. The switch runs on a copy; a bad block leaves the chain as is.
    fn accept_chain(&mut self, blocks: &[Block]) -> Result<Option<ChainUpdate>, NodeError> {
        match blocks.first() {
            Some(genesis) if genesis.hash() == Block::genesis().hash() => {}
            _ => {
                return Err(NodeError::InvalidBlock(
                    "chain does not start at genesis".to_string(),
                ))
            }
        }
        let their_height = (blocks.len() - 1) as u64;
        if their_height <= self.chain.height() {
            return Ok(None);
        }

        let fork = self.chain.find_fork(blocks);
        let mut next = self.chain.clone();
        let mut update = ChainUpdate::default();
        let mut disconnected = Vec::new();
        while next.height() > fork {
            let (block, undo) = next.disconnect_tip()?;
            disconnected.push(block);
            update.disconnected.push(undo);
        }
        disconnected.reverse();

        let mut confirmed = BTreeSet::new();
        for block in &blocks[(fork as usize + 1)..] {
            next.connect(block.clone())?;
            let undo = next.undo(block.height).cloned().ok_or_else(|| {
                NodeError::Fatal(format!("no undo record for block {}", block.height))
            })?;
            confirmed.extend(block.txs.iter().map(|tx| tx.txid()));
            update.connected.push((block.clone(), undo));
        }

        if disconnected.is_empty() {
            log::info!("synced to height {}", next.height());
        } else {
            log::info!(
                "reorg at fork {}: disconnected {}, connected {}, new tip {}",
                fork,
                disconnected.len(),
                update.connected.len(),
                next.height()
            );
        }
        self.chain = next;
        self.replay(&disconnected, &confirmed);
        Ok(Some(update))
    }

    fn invalidate_tip(&mut self) -> Result<(BlockHash, ChainUpdate), NodeError> {
        let (block, undo) = self.chain.disconnect_tip()?;
        let hash = undo.block_hash;
        self.replay(&[block], &BTreeSet::new());
        Ok((
            hash,
            ChainUpdate {
                disconnected: vec![undo],
                connected: Vec::new(),
            },
        ))
    }

    /// Token lookup for building transactions: pending tokens count.
    fn resolve_pending(&self, key: &str) -> Result<&Token, LedgerError> {
        self.mempool
            .view()
            .tokens
            .resolve(key)
            .ok_or_else(|| no_such_token(key))
    }

    /// "a@X,b@Y" into per-token totals.
    fn parse_balances<'a, I>(&self, items: I) -> Result<TokenAmounts, NodeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut balances = TokenAmounts::new();
        for item in items {
            for entry in TokenAmount::parse_list(item)? {
                let token = TokenRef::of(self.resolve_pending(&entry.token)?);
                let sum = balances.entry(token).or_insert(0);
                *sum = sum.checked_add(entry.amount).ok_or_else(|| {
                    LedgerError::AmountOutOfRange("Amount out of range".to_string())
                })?;
            }
        }
        Ok(balances)
    }

    /// Build a transaction from the wallet and admit it to the mempool.
    fn submit(
        &mut self,
        auth: &[String],
        outputs: Vec<TxOut>,
        op: Option<CustomTx>,
    ) -> Result<TxId, NodeError> {
        let params = self.params();
        let tx = self.wallet.build_transaction(
            self.mempool.view(),
            self.chain.height(),
            &params,
            auth,
            outputs,
            op,
        )?;
        Ok(self.mempool.add_transaction(tx, &params)?)
    }

    fn pending_txs(&self) -> Vec<Transaction> {
        self.mempool.transactions().cloned().collect()
    }
}

impl Node {
    /// Open the node described by `config`: sled-backed when `data_dir` is
    /// set, in memory otherwise.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate().map_err(NodeError::Config)?;
        let (inner, db) = match &config.data_dir {
            Some(dir) => {
                let db = LedgerDb::open(dir).map_err(NodeError::Storage)?;
                let stored = db.load().map_err(NodeError::Storage)?;
                (NodeInner::restore(&config, stored)?, Some(db))
            }
            None => (NodeInner::fresh(&config), None),
        };
        log::info!(
            "node {} ready at height {}",
            config.node_id,
            inner.chain.height()
        );
        Ok(Self {
            config,
            inner: RwLock::new(inner),
            db,
            halted: AtomicBool::new(false),
        })
    }

    /// In-memory node with the given chain parameters.
    pub fn in_memory(node_id: &str, params: ChainParams) -> Result<Self, NodeError> {
        let mut config = NodeConfig::new(node_id);
        config.chain.coinbase_maturity = params.coinbase_maturity;
        config.chain.block_reward = params.block_reward;
        config.chain.token_collateral = params.token_collateral;
        Self::new(config)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn halt(&self, reason: &NodeError) {
        self.halted.store(true, Ordering::SeqCst);
        log::error!("node {} halted: {}", self.config.node_id, reason);
    }

    /// Halt on fatal errors, pass everything through.
    fn checked<T>(&self, result: Result<T, NodeError>) -> Result<T, NodeError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.halt(e);
            }
        }
        result
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, NodeInner>, NodeError> {
        if self.is_halted() {
            return Err(NodeError::Halted);
        }
        self.inner
            .read()
            .map_err(|_| NodeError::Fatal("node state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, NodeInner>, NodeError> {
        if self.is_halted() {
            return Err(NodeError::Halted);
        }
        self.inner
            .write()
            .map_err(|_| NodeError::Fatal("node state lock poisoned".to_string()))
    }

    fn persist(&self, inner: &NodeInner, update: &ChainUpdate) -> Result<(), NodeError> {
        let committed = match &self.db {
            Some(db) => db.commit(
                update,
                inner.chain.state(),
                &inner.pending_txs(),
                &inner.wallet,
            ),
            None => Ok(()),
        };
        self.committed(committed)
    }

    /// Memory is already ahead of disk when a commit fails, so the node stops
    /// serving. Reopening resumes from the last commit.
    fn committed(&self, result: Result<(), String>) -> Result<(), NodeError> {
        result.map_err(|e| {
            let err = NodeError::Storage(e);
            self.halt(&err);
            err
        })
    }

    /// Run a mutating command under the write lock and persist its effect.
    fn mutate<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&mut NodeInner) -> Result<(T, ChainUpdate), NodeError>,
    {
        let mut inner = self.write()?;
        let result = match f(&mut *inner) {
            Ok((value, update)) => self.persist(&inner, &update).map(|_| value),
            Err(e) => Err(e),
        };
        self.checked(result)
    }

    fn query<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&NodeInner) -> Result<T, NodeError>,
    {
        let inner = self.read()?;
        self.checked(f(&*inner))
    }

    // ─────────────────────────────────────────────────────────────
    // Chain
    // ─────────────────────────────────────────────────────────────

    /// Mine `n` blocks, each committed on its own.
    pub fn generate(&self, n: u64) -> Result<Vec<BlockHash>, NodeError> {
        let mut inner = self.write()?;
        let mut hashes = Vec::new();
        for _ in 0..n {
            let mined = inner.mine_block();
            let (block, undo) = self.checked(mined)?;
            let hash = undo.block_hash;
            let update = ChainUpdate {
                disconnected: Vec::new(),
                connected: vec![(block, undo)],
            };
            self.persist(&inner, &update)?;
            hashes.push(hash);
        }
        Ok(hashes)
    }

    /// Adopt `blocks` (genesis first) when longer than the active chain.
    /// Returns whether the active chain changed.
    pub fn accept_chain(&self, blocks: &[Block]) -> Result<bool, NodeError> {
        self.mutate(|inner| match inner.accept_chain(blocks)? {
            Some(update) => Ok((true, update)),
            None => Ok((false, ChainUpdate::default())),
        })
    }

    /// Disconnect the tip block; its transactions go back to the mempool.
    pub fn invalidate_tip(&self) -> Result<BlockHash, NodeError> {
        self.mutate(|inner| inner.invalidate_tip())
    }

    pub fn block_count(&self) -> Result<u64, NodeError> {
        self.query(|inner| Ok(inner.chain.height()))
    }

    pub fn best_block_hash(&self) -> Result<BlockHash, NodeError> {
        self.query(|inner| Ok(inner.chain.tip_hash()))
    }

    /// Active chain, genesis first.
    pub fn blocks(&self) -> Result<Vec<Block>, NodeError> {
        self.query(|inner| Ok(inner.chain.blocks().to_vec()))
    }

    pub fn state_root(&self) -> Result<String, NodeError> {
        self.query(|inner| Ok(inner.chain.state().state_root()))
    }

    /// Snapshot of the confirmed tip state.
    pub fn tip_state(&self) -> Result<LedgerState, NodeError> {
        self.query(|inner| Ok(inner.chain.state().clone()))
    }

    // ─────────────────────────────────────────────────────────────
    // Mempool & wallet
    // ─────────────────────────────────────────────────────────────

    pub fn send_raw_transaction(&self, tx: Transaction) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let params = inner.params();
            let txid = inner.mempool.add_transaction(tx, &params)?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    /// Pending txids in admission order.
    pub fn raw_mempool(&self) -> Result<Vec<TxId>, NodeError> {
        self.query(|inner| Ok(inner.mempool.txids()))
    }

    pub fn mempool_stats(&self) -> Result<MempoolStats, NodeError> {
        self.query(|inner| Ok(inner.mempool.stats()))
    }

    pub fn get_new_address(&self) -> Result<String, NodeError> {
        self.mutate(|inner| Ok((inner.wallet.get_new_address(), ChainUpdate::default())))
    }

    pub fn import_address(&self, address: &str) -> Result<bool, NodeError> {
        if address.is_empty() {
            return Err(NodeError::InvalidParameter("empty address".to_string()));
        }
        self.mutate(|inner| Ok((inner.wallet.import_address(address), ChainUpdate::default())))
    }

    pub fn default_address(&self) -> Result<String, NodeError> {
        self.query(|inner| Ok(inner.wallet.default_address().to_string()))
    }

    /// Spendable native balance of the wallet, pending transactions applied.
    pub fn get_balance(&self) -> Result<Amount, NodeError> {
        self.query(|inner| {
            Ok(inner.wallet.balance(
                inner.mempool.view(),
                inner.chain.height(),
                inner.chain.params(),
            ))
        })
    }

    pub fn send_to_address(&self, address: &str, amount: Amount) -> Result<TxId, NodeError> {
        if amount == 0 {
            return Err(LedgerError::AmountOutOfRange("Amount out of range".to_string()).into());
        }
        self.mutate(|inner| {
            let txid = inner.submit(&[], vec![TxOut::new(address, amount)], None)?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────

    pub fn create_token(
        &self,
        symbol: &str,
        name: &str,
        collateral_address: &str,
    ) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let collateral = inner.chain.params().token_collateral;
            let op = CustomTx::CreateToken {
                symbol: symbol.to_string(),
                name: name.to_string(),
                collateral_address: collateral_address.to_string(),
            };
            let txid = inner.submit(
                &[],
                vec![TxOut::new(collateral_address, collateral)],
                Some(op),
            )?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    pub fn destroy_token(&self, key: &str) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let token = inner.resolve_pending(key)?;
            let op = CustomTx::DestroyToken {
                token: TokenRef::of(token),
            };
            let auth: Vec<String> = token.collateral_address.iter().cloned().collect();
            let txid = inner.submit(&auth, Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    /// `amounts` is "amount@token[,amount@token...]".
    pub fn mint_tokens(&self, amounts: &str) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let mut minted = TokenAmounts::new();
            let mut auth: Vec<String> = Vec::new();
            for entry in TokenAmount::parse_list(amounts)? {
                let token = inner.resolve_pending(&entry.token)?;
                if let Some(owner) = &token.collateral_address {
                    if !auth.contains(owner) {
                        auth.push(owner.clone());
                    }
                }
                let sum = minted.entry(TokenRef::of(token)).or_insert(0);
                *sum = sum.checked_add(entry.amount).ok_or_else(|| {
                    LedgerError::AmountOutOfRange("Amount out of range".to_string())
                })?;
            }
            if minted.is_empty() {
                return Err(NodeError::InvalidParameter("no amounts to mint".to_string()));
            }
            let txid = inner.submit(&auth, Vec::new(), Some(CustomTx::MintTokens { amounts: minted }))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    /// Every token, or only the one `key` (id, symbol or creation txid)
    /// names; an unknown key lists nothing.
    pub fn list_tokens(&self, key: Option<&str>, verbose: bool) -> Result<Value, NodeError> {
        self.query(|inner| {
            let tokens = &inner.chain.state().tokens;
            Ok(match key {
                Some(key) => rpc::tokens_json(tokens.resolve(key), verbose),
                None => rpc::tokens_json(tokens.iter().map(|(_, t)| t), verbose),
            })
        })
    }

    /// `{id: token}` for an id, symbol or creation txid.
    pub fn get_token(&self, key: &str) -> Result<Value, NodeError> {
        self.query(|inner| {
            let token = inner
                .chain
                .state()
                .tokens
                .resolve(key)
                .ok_or_else(|| no_such_token(key))?;
            Ok(rpc::tokens_json([token], true))
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────

    pub fn get_account(
        &self,
        address: &str,
        page: Pagination,
        include_ids: bool,
    ) -> Result<Value, NodeError> {
        self.query(|inner| {
            let state = inner.chain.state();
            Ok(rpc::account_json(
                state,
                state.balances.account(address),
                page,
                include_ids,
            ))
        })
    }

    /// Confirmed balance of one token, by id, symbol or creation txid.
    pub fn token_balance(&self, address: &str, token: &str) -> Result<Amount, NodeError> {
        self.query(|inner| {
            let state = inner.chain.state();
            let id: DctId = state.tokens.resolve(token).ok_or_else(|| no_such_token(token))?.id;
            Ok(state.balances.get(address, id))
        })
    }

    /// `to` maps each recipient to "amount@token[,amount@token...]". Each of
    /// `auth_addresses` signs with one coin next to `from`.
    pub fn account_to_account(
        &self,
        auth_addresses: &[String],
        from: &str,
        to: &BTreeMap<String, String>,
    ) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let mut recipients = BTreeMap::new();
            for (address, amounts) in to {
                recipients.insert(address.clone(), inner.parse_balances([amounts.as_str()])?);
            }
            let op = CustomTx::AccountToAccount {
                from: from.to_string(),
                to: recipients,
            };
            let mut auth = vec![from.to_string()];
            auth.extend(auth_addresses.iter().cloned());
            let txid = inner.submit(&auth, Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Pools
    // ─────────────────────────────────────────────────────────────

    pub fn create_pool_pair(&self, request: &CreatePoolPairRequest) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let tradable = |key: &str| {
                inner
                    .resolve_pending(key)
                    .map(TokenRef::of)
                    .map_err(|_| LedgerError::InvalidToken(format!("token {} does not exist", key)))
            };
            let op = CustomTx::CreatePoolPair {
                token_a: tradable(&request.token_a)?,
                token_b: tradable(&request.token_b)?,
                commission: request.commission,
                owner_fee_address: request.owner_fee_address.clone(),
                status: request.status,
                pair_symbol: request.pair_symbol.clone(),
            };
            let txid = inner.submit(&[], Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    /// `from` maps each provider to its "amount@token" entries.
    pub fn add_pool_liquidity(
        &self,
        from: &BTreeMap<String, Vec<String>>,
        share_address: &str,
    ) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let mut providers = BTreeMap::new();
            for (address, amounts) in from {
                let balances = inner.parse_balances(amounts.iter().map(String::as_str))?;
                providers.insert(address.clone(), balances);
            }
            let auth: Vec<String> = from.keys().cloned().collect();
            let op = CustomTx::AddPoolLiquidity {
                from: providers,
                share_address: share_address.to_string(),
            };
            let txid = inner.submit(&auth, Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    /// `amount` is "shares@POOLSYMBOL".
    pub fn remove_pool_liquidity(&self, from: &str, amount: &str) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let entry = TokenAmount::parse(amount)?;
            let pool = inner
                .resolve_pending(&entry.token)
                .map(TokenRef::of)
                .map_err(|_| LedgerError::NotFound("there is no such pool pair".to_string()))?;
            let op = CustomTx::RemovePoolLiquidity {
                from: from.to_string(),
                pool,
                amount: entry.amount,
            };
            let txid = inner.submit(&[from.to_string()], Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    pub fn pool_swap(&self, request: &PoolSwapRequest) -> Result<TxId, NodeError> {
        self.mutate(|inner| {
            let token_from = TokenRef::of(inner.resolve_pending(&request.token_from)?);
            let token_to = TokenRef::of(inner.resolve_pending(&request.token_to)?);
            let op = CustomTx::PoolSwap {
                from: request.from.clone(),
                token_from,
                amount_from: request.amount_from,
                to: request.to.clone(),
                token_to,
            };
            let txid = inner.submit(&[request.from.clone()], Vec::new(), Some(op))?;
            Ok((txid, ChainUpdate::default()))
        })
    }

    pub fn list_pool_pairs(&self, page: Pagination, verbose: bool) -> Result<Value, NodeError> {
        self.query(|inner| Ok(rpc::pools_json(inner.chain.state(), page, verbose)))
    }

    /// `{id: pool}` for a pool id or pair symbol.
    pub fn get_pool_pair(&self, key: &str) -> Result<Value, NodeError> {
        self.query(|inner| {
            let state = inner.chain.state();
            let pool = state
                .tokens
                .resolve(key)
                .and_then(|t| state.pools.get(t.id))
                .ok_or_else(|| LedgerError::NotFound(format!("Pool {} not found", key)))?;
            let mut map = serde_json::Map::new();
            map.insert(pool.id.to_string(), rpc::pool_json(state, pool, true));
            Ok(Value::Object(map))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfx_core::{OutPoint, COIN};

    fn params() -> ChainParams {
        ChainParams {
            coinbase_maturity: 2,
            ..ChainParams::default()
        }
    }

    fn node(id: &str) -> Node {
        Node::in_memory(id, params()).unwrap()
    }

    fn spend_collateral(create: TxId, to: &str) -> Transaction {
        Transaction {
            inputs: vec![OutPoint::new(create, 0)],
            outputs: vec![TxOut::new(to, 999_900_000)],
            op: None,
            coinbase_height: None,
        }
    }

    #[test]
    fn test_generate_and_wallet_maturity() {
        let node = node("n0");
        assert_eq!(node.generate(2).unwrap().len(), 2);
        assert_eq!(node.block_count().unwrap(), 2);

        let collateral = node.get_new_address().unwrap();
        let err = node.create_token("GOLD", "gold", &collateral).unwrap_err();
        assert!(err.to_string().contains("Insufficient funds"));

        node.generate(1).unwrap();
        let txid = node.create_token("GOLD", "gold", &collateral).unwrap();
        assert_eq!(node.raw_mempool().unwrap(), vec![txid]);
        // queries show the confirmed tip only
        assert_eq!(node.list_tokens(None, true).unwrap().as_object().unwrap().len(), 1);

        node.generate(1).unwrap();
        assert!(node.raw_mempool().unwrap().is_empty());
        let listed = node.get_token("GOLD").unwrap();
        assert_eq!(listed["128"]["creationTx"], txid.to_hex());
        assert_eq!(node.get_token(&txid.to_hex()).unwrap(), listed);
        assert_eq!(node.get_token("128").unwrap(), listed);

        assert_eq!(node.list_tokens(Some("GOLD"), true).unwrap(), listed);
        assert_eq!(
            node.list_tokens(Some(&txid.to_hex()), false).unwrap(),
            serde_json::json!({"128": {"symbol": "GOLD", "name": "gold"}})
        );
        assert_eq!(node.list_tokens(Some("SILVER"), true).unwrap(), serde_json::json!({}));
        assert_eq!(listed["128"]["mintable"], true);
    }

    #[test]
    fn test_collateral_lock_states() {
        let node = node("n0");
        node.generate(3).unwrap();
        let collateral = node.get_new_address().unwrap();
        let create = node.create_token("GOLD", "gold", &collateral).unwrap();

        let err = node
            .send_raw_transaction(spend_collateral(create, &collateral))
            .unwrap_err();
        assert!(err.to_string().starts_with("collateral-locked-in-mempool,"));

        node.generate(1).unwrap();
        let err = node
            .send_raw_transaction(spend_collateral(create, &collateral))
            .unwrap_err();
        assert!(err.to_string().starts_with("collateral-locked,"));

        // destroy needs a spendable coin on the collateral address
        let err = node.destroy_token("GOLD").unwrap_err();
        assert!(err.to_string().contains("Can't find any UTXO's"));
    }

    #[test]
    fn test_invalidate_tip_requeues() {
        let node = node("n0");
        node.generate(3).unwrap();
        let addr = node.get_new_address().unwrap();
        let txid = node.send_to_address(&addr, COIN).unwrap();
        node.generate(1).unwrap();
        assert!(node.raw_mempool().unwrap().is_empty());

        node.invalidate_tip().unwrap();
        assert_eq!(node.block_count().unwrap(), 3);
        assert_eq!(node.raw_mempool().unwrap(), vec![txid]);
    }

    #[test]
    fn test_accept_longer_chain_only() {
        let a = node("a");
        let b = node("b");
        a.generate(3).unwrap();
        b.generate(2).unwrap();
        assert!(!b.accept_chain(&b.blocks().unwrap()).unwrap());
        assert!(!a.accept_chain(&b.blocks().unwrap()).unwrap());
        assert!(b.accept_chain(&a.blocks().unwrap()).unwrap());
        assert_eq!(b.best_block_hash().unwrap(), a.best_block_hash().unwrap());
        assert_eq!(b.state_root().unwrap(), a.state_root().unwrap());
    }

    #[test]
    fn test_bad_chain_leaves_node_untouched() {
        let a = node("a");
        let b = node("b");
        a.generate(3).unwrap();
        b.generate(1).unwrap();
        let root = b.state_root().unwrap();

        let mut blocks = a.blocks().unwrap();
        blocks[3].txs[0] = Transaction::coinbase(3, "dfxgreedy", 1_000 * COIN);
        assert!(b.accept_chain(&blocks).is_err());
        assert_eq!(b.block_count().unwrap(), 1);
        assert_eq!(b.state_root().unwrap(), root);
        assert!(!b.is_halted());
    }

    #[test]
    fn test_invariant_violation_halts() {
        let node = node("n0");
        node.generate(1).unwrap();
        {
            let mut inner = node.inner.write().unwrap();
            let coinbase = inner.chain.tip().txs[0].txid();
            inner
                .chain
                .state_mut()
                .coins
                .spend(&OutPoint::new(coinbase, 0), &mut Journal::new())
                .unwrap();
        }
        assert!(node.invalidate_tip().unwrap_err().is_fatal());
        assert!(node.is_halted());
        assert_eq!(node.block_count().unwrap_err(), NodeError::Halted);
    }

    #[test]
    fn test_failed_commit_halts() {
        let node = node("n0");
        node.generate(1).unwrap();
        let err = node
            .committed(Err("No space left on device".to_string()))
            .unwrap_err();
        assert_eq!(err, NodeError::Storage("No space left on device".to_string()));
        assert!(node.is_halted());
        assert_eq!(node.generate(1).unwrap_err(), NodeError::Halted);
        assert_eq!(node.block_count().unwrap_err(), NodeError::Halted);
    }

    #[test]
    fn test_reopen_restores_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::new("persisted");
        config.chain.coinbase_maturity = 2;
        config.data_dir = Some(dir.path().to_path_buf());

        let (root, height, pending, address) = {
            let node = Node::new(config.clone()).unwrap();
            node.generate(4).unwrap();
            let collateral = node.get_new_address().unwrap();
            node.create_token("GOLD", "gold", &collateral).unwrap();
            node.generate(1).unwrap();
            node.mint_tokens("5@GOLD").unwrap_err();
            let pending = node.send_to_address(&collateral, COIN).unwrap();
            (
                node.state_root().unwrap(),
                node.block_count().unwrap(),
                pending,
                collateral,
            )
        };

        let node = Node::new(config).unwrap();
        assert_eq!(node.state_root().unwrap(), root);
        assert_eq!(node.block_count().unwrap(), height);
        assert_eq!(node.raw_mempool().unwrap(), vec![pending]);
        // wallet kept the derived address
        assert!(!node.import_address(&address).unwrap());
    }
}
