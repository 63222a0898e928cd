// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - DATABASE MODULE
//
// sled embedded database for the ledger. Every chain update (block connect,
// tip disconnect or a whole reorg) and the node's mempool and wallet are
// committed as one cross-tree transaction.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::wallet::Wallet;
use dfx_core::store::{dirty_records, load_state};
use dfx_core::{Block, BlockUndo, LedgerState, Transaction, UndoEntry};
use sled::{Db, Tree};
use std::path::Path;

const TREE_STATE: &str = "state";
const TREE_BLOCKS: &str = "blocks";
const TREE_UNDO: &str = "undo";
const TREE_NODE: &str = "node";

const KEY_MEMPOOL: &[u8] = b"mempool";
const KEY_WALLET: &[u8] = b"wallet";

/// Blocks removed from and added to the active chain by one update.
#[derive(Debug, Clone, Default)]
pub struct ChainUpdate {
    /// Undo records of disconnected blocks
    pub disconnected: Vec<BlockUndo>,
    pub connected: Vec<(Block, BlockUndo)>,
}

impl ChainUpdate {
    pub fn is_empty(&self) -> bool {
        self.disconnected.is_empty() && self.connected.is_empty()
    }

    /// Every state slot touched on either side of the update.
    fn touched(&self) -> Vec<UndoEntry> {
        self.disconnected
            .iter()
            .chain(self.connected.iter().map(|(_, undo)| undo))
            .flat_map(|undo| undo.entries.iter().cloned())
            .collect()
    }
}

/// Everything a node persisted, blocks in height order from 1.
#[derive(Debug, Clone)]
pub struct StoredChain {
    pub blocks: Vec<Block>,
    pub undos: Vec<BlockUndo>,
    pub state: LedgerState,
    pub mempool: Vec<Transaction>,
    pub wallet: Option<Wallet>,
}

pub struct LedgerDb {
    db: Db,
}

fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

impl LedgerDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let db = sled::open(path.as_ref())
            .map_err(|e| format!("Failed to open database: {}", e))?;
        Ok(Self { db })
    }

    fn tree(&self, name: &str) -> Result<Tree, String> {
        self.db
            .open_tree(name)
            .map_err(|e| format!("Failed to open {} tree: {}", name, e))
    }

    /// Commit a chain update together with the node's mempool and wallet
    /// (TRULY ATOMIC: one cross-tree transaction, then flush).
    pub fn commit(
        &self,
        update: &ChainUpdate,
        state: &LedgerState,
        mempool: &[Transaction],
        wallet: &Wallet,
    ) -> Result<(), String> {
        use sled::Transactional;

        let state_tree = self.tree(TREE_STATE)?;
        let blocks_tree = self.tree(TREE_BLOCKS)?;
        let undo_tree = self.tree(TREE_UNDO)?;
        let node_tree = self.tree(TREE_NODE)?;

        // Serialize outside the transaction
        let dirty = dirty_records(state, &update.touched())
            .map_err(|e| format!("Failed to serialize state: {}", e))?;

        let removed: Vec<[u8; 8]> = update
            .disconnected
            .iter()
            .map(|undo| height_key(undo.height))
            .collect();

        let mut added = Vec::with_capacity(update.connected.len());
        for (block, undo) in &update.connected {
            let block_bytes = bincode::serialize(block)
                .map_err(|e| format!("Failed to serialize block: {}", e))?;
            let undo_bytes = bincode::serialize(undo)
                .map_err(|e| format!("Failed to serialize undo: {}", e))?;
            added.push((height_key(block.height), block_bytes, undo_bytes));
        }

        let mempool_bytes = bincode::serialize(mempool)
            .map_err(|e| format!("Failed to serialize mempool: {}", e))?;
        let wallet_bytes = bincode::serialize(wallet)
            .map_err(|e| format!("Failed to serialize wallet: {}", e))?;

        (&state_tree, &blocks_tree, &undo_tree, &node_tree)
            .transaction(|(tx_state, tx_blocks, tx_undo, tx_node)| {
                for (key, value) in &dirty {
                    match value {
                        Some(v) => tx_state.insert(key.as_slice(), v.as_slice())?,
                        None => tx_state.remove(key.as_slice())?,
                    };
                }
                for key in &removed {
                    tx_blocks.remove(key.as_slice())?;
                    tx_undo.remove(key.as_slice())?;
                }
                for (key, block, undo) in &added {
                    tx_blocks.insert(key.as_slice(), block.as_slice())?;
                    tx_undo.insert(key.as_slice(), undo.as_slice())?;
                }
                tx_node.insert(KEY_MEMPOOL, mempool_bytes.as_slice())?;
                tx_node.insert(KEY_WALLET, wallet_bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| {
                format!("Atomic commit failed: {:?}", e)
            })?;

        self.db
            .flush()
            .map_err(|e| format!("Failed to flush to disk: {}", e))?;
        Ok(())
    }

    pub fn load(&self) -> Result<StoredChain, String> {
        let state_tree = self.tree(TREE_STATE)?;
        let blocks_tree = self.tree(TREE_BLOCKS)?;
        let undo_tree = self.tree(TREE_UNDO)?;
        let node_tree = self.tree(TREE_NODE)?;

        // sled iterates in key order; big-endian heights sort numerically
        let mut blocks = Vec::new();
        for item in blocks_tree.iter() {
            let (_, value) = item.map_err(|e| format!("Failed to read block: {}", e))?;
            let block: Block = bincode::deserialize(&value)
                .map_err(|e| format!("Failed to deserialize block: {}", e))?;
            blocks.push(block);
        }

        let mut undos = Vec::new();
        for item in undo_tree.iter() {
            let (_, value) = item.map_err(|e| format!("Failed to read undo: {}", e))?;
            let undo: BlockUndo = bincode::deserialize(&value)
                .map_err(|e| format!("Failed to deserialize undo: {}", e))?;
            undos.push(undo);
        }

        let mut records = Vec::new();
        for item in state_tree.iter() {
            let (key, value) = item.map_err(|e| format!("Failed to read state: {}", e))?;
            records.push((key.to_vec(), value.to_vec()));
        }
        let state =
            load_state(records).map_err(|e| format!("Failed to deserialize state: {}", e))?;

        let mempool = match node_tree
            .get(KEY_MEMPOOL)
            .map_err(|e| format!("Failed to read mempool: {}", e))?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| format!("Failed to deserialize mempool: {}", e))?,
            None => Vec::new(),
        };

        let wallet = match node_tree
            .get(KEY_WALLET)
            .map_err(|e| format!("Failed to read wallet: {}", e))?
        {
            Some(bytes) => Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| format!("Failed to deserialize wallet: {}", e))?,
            ),
            None => None,
        };

        Ok(StoredChain {
            blocks,
            undos,
            state,
            mempool,
            wallet,
        })
    }

    pub fn flush(&self) -> Result<(), String> {
        self.db
            .flush()
            .map_err(|e| format!("Failed to flush database: {}", e))?;
        Ok(())
    }
}
