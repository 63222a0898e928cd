//! Active chain: blocks by height, one undo record per connected block, and
//! the ledger state at the tip.

use crate::error::NodeError;
use dfx_core::{Block, BlockHash, BlockUndo, ChainParams, LedgerState};

#[derive(Debug, Clone)]
pub struct Chain {
    params: ChainParams,
    /// blocks[h] is the block at height h; blocks[0] is genesis
    blocks: Vec<Block>,
    /// undos[h - 1] reverts blocks[h]
    undos: Vec<BlockUndo>,
    state: LedgerState,
}

impl Chain {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            blocks: vec![Block::genesis()],
            undos: Vec::new(),
            state: LedgerState::new(),
        }
    }

    /// Reassemble a chain from storage. Heights must be contiguous from 1.
    pub fn from_parts(
        params: ChainParams,
        blocks: Vec<Block>,
        undos: Vec<BlockUndo>,
        state: LedgerState,
    ) -> Result<Self, NodeError> {
        let mut all = vec![Block::genesis()];
        all.extend(blocks);
        if undos.len() + 1 != all.len() {
            return Err(NodeError::Storage(format!(
                "{} stored blocks but {} undo records",
                all.len() - 1,
                undos.len()
            )));
        }
        for (height, block) in all.iter().enumerate().skip(1) {
            if block.height != height as u64 || block.prev_hash != all[height - 1].hash() {
                return Err(NodeError::Storage(format!(
                    "stored block at height {} does not link",
                    height
                )));
            }
        }
        Ok(Self {
            params,
            blocks: all,
            undos,
            state,
        })
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.tip().hash()
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn undo(&self, height: u64) -> Option<&BlockUndo> {
        height
            .checked_sub(1)
            .and_then(|i| self.undos.get(i as usize))
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut LedgerState {
        &mut self.state
    }

    /// Connect `block` on top of the tip.
    pub fn connect(&mut self, block: Block) -> Result<(), NodeError> {
        if block.height != self.height() + 1 {
            return Err(NodeError::InvalidBlock(format!(
                "expected height {}, got {}",
                self.height() + 1,
                block.height
            )));
        }
        if block.prev_hash != self.tip_hash() {
            return Err(NodeError::InvalidBlock(format!(
                "block {} does not build on tip {}",
                block.height,
                self.tip_hash()
            )));
        }
        let undo = self.state.connect_block(&block, &self.params)?;
        log::info!(
            "connected block {} {} ({} txs)",
            block.height,
            undo.block_hash,
            block.txs.len()
        );
        self.undos.push(undo);
        self.blocks.push(block);
        Ok(())
    }

    /// Disconnect the tip, returning it with its undo record.
    pub fn disconnect_tip(&mut self) -> Result<(Block, BlockUndo), NodeError> {
        if self.height() == 0 {
            return Err(NodeError::InvalidBlock(
                "cannot disconnect genesis".to_string(),
            ));
        }
        let undo = self
            .undos
            .last()
            .ok_or_else(|| NodeError::Fatal("missing undo record for tip".to_string()))?;
        if undo.block_hash != self.tip_hash() {
            return Err(NodeError::Fatal(format!(
                "undo record {} does not match tip {}",
                undo.block_hash,
                self.tip_hash()
            )));
        }
        self.state.disconnect_block(undo)?;

        let (block, undo) = match (self.blocks.pop(), self.undos.pop()) {
            (Some(b), Some(u)) => (b, u),
            _ => return Err(NodeError::Fatal("chain shorter than undo log".to_string())),
        };
        log::info!("disconnected block {} {}", block.height, undo.block_hash);
        Ok((block, undo))
    }

    /// Highest height at which `other` (genesis first) agrees with this chain.
    pub fn find_fork(&self, other: &[Block]) -> u64 {
        let mut fork = 0;
        for (height, (mine, theirs)) in self.blocks.iter().zip(other).enumerate() {
            if mine.hash() != theirs.hash() {
                break;
            }
            fork = height as u64;
        }
        fork
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfx_core::{Transaction, COIN};

    fn next_block(chain: &Chain, miner: &str) -> Block {
        let height = chain.height() + 1;
        Block {
            height,
            prev_hash: chain.tip_hash(),
            time: height,
            txs: vec![Transaction::coinbase(height, miner, 50 * COIN)],
        }
    }

    fn grow(chain: &mut Chain, n: usize, miner: &str) {
        for _ in 0..n {
            let block = next_block(chain, miner);
            chain.connect(block).unwrap();
        }
    }

    #[test]
    fn test_connect_checks_linkage() {
        let mut chain = Chain::new(ChainParams::default());
        let mut block = next_block(&chain, "dfxa");
        block.height = 2;
        assert!(matches!(chain.connect(block), Err(NodeError::InvalidBlock(_))));

        let mut block = next_block(&chain, "dfxa");
        block.prev_hash = dfx_core::Hash256::NULL;
        assert!(chain.connect(block).is_err());
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_disconnect_restores_state() {
        let mut chain = Chain::new(ChainParams::default());
        grow(&mut chain, 2, "dfxa");
        let root = chain.state().state_root();
        grow(&mut chain, 1, "dfxa");
        let (block, _) = chain.disconnect_tip().unwrap();
        assert_eq!(block.height, 3);
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.state().state_root(), root);
    }

    #[test]
    fn test_genesis_cannot_disconnect() {
        let mut chain = Chain::new(ChainParams::default());
        assert!(chain.disconnect_tip().is_err());
    }

    #[test]
    fn test_find_fork() {
        let mut a = Chain::new(ChainParams::default());
        grow(&mut a, 3, "dfxa");
        let mut b = a.clone();
        grow(&mut a, 2, "dfxa");
        grow(&mut b, 4, "dfxb");
        assert_eq!(a.find_fork(b.blocks()), 3);
        assert_eq!(b.find_fork(a.blocks()), 3);
        assert_eq!(a.find_fork(a.blocks()), 5);
    }

    #[test]
    fn test_from_parts_rejects_gaps() {
        let mut chain = Chain::new(ChainParams::default());
        grow(&mut chain, 2, "dfxa");
        let blocks = chain.blocks()[2..].to_vec();
        let undos = vec![chain.undo(2).unwrap().clone()];
        assert!(Chain::from_parts(
            ChainParams::default(),
            blocks,
            undos,
            chain.state().clone()
        )
        .is_err());
    }
}
