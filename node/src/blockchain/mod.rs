//! The node's append-only chain of blocks.
//!
//! The chain is shared by every worker and the consensus gate. Reads take the
//! read lock; `append_if_tip` checks linkage and appends under one write lock,
//! so a block sealed on an outdated tip can never land.

use medchain_core::{Block, BlockError, GENESIS_PREVIOUS_HASH};
use miner::{ChainTip, ChainView};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Block {index} does not extend the tip: expected index {expected_index} on {expected_hash}")]
    StaleTip {
        index: u64,
        expected_index: u64,
        expected_hash: String,
    },

    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(String),

    #[error("Block {index} is invalid: {source}")]
    InvalidBlock {
        index: u64,
        #[source]
        source: BlockError,
    },

    #[error("Block {index} is not linked to its predecessor")]
    BrokenLink { index: u64 },
}

#[derive(Debug)]
pub struct Chain {
    blocks: RwLock<Vec<Block>>,
}

impl Chain {
    /// Start a chain from a fresh genesis block
    pub fn new(difficulty: u32) -> Result<Self, BlockError> {
        let genesis = Block::genesis(difficulty)?;
        info!(hash = %genesis.hash(), "Initialized blockchain with genesis block");
        Ok(Self::from_genesis(genesis))
    }

    pub fn from_genesis(genesis: Block) -> Self {
        Self {
            blocks: RwLock::new(vec![genesis]),
        }
    }

    pub fn tip(&self) -> ChainTip {
        match self.blocks.read().last() {
            Some(last) => ChainTip {
                index: last.index(),
                hash: last.hash().to_string(),
            },
            // Seeded with genesis and append-only, so only reachable if that changes
            None => ChainTip {
                index: 0,
                hash: GENESIS_PREVIOUS_HASH.to_string(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    pub fn latest(&self) -> Option<Block> {
        self.blocks.read().last().cloned()
    }

    pub fn get(&self, index: u64) -> Option<Block> {
        self.blocks.read().get(index as usize).cloned()
    }

    /// Snapshot of every block
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    /// Append `block` if it directly extends the current tip
    pub fn append_if_tip(&self, block: Block) -> Result<(), ChainError> {
        let mut blocks = self.blocks.write();
        let (tip_index, tip_hash) = match blocks.last() {
            Some(last) => (last.index(), last.hash()),
            None => return Err(ChainError::InvalidGenesis("chain has no blocks".to_string())),
        };

        if block.index() != tip_index + 1 || block.previous_hash() != tip_hash {
            return Err(ChainError::StaleTip {
                index: block.index(),
                expected_index: tip_index + 1,
                expected_hash: tip_hash.to_string(),
            });
        }

        blocks.push(block);
        Ok(())
    }

    /// Check linkage, integrity and proof of work of the whole chain
    pub fn validate(&self) -> Result<(), ChainError> {
        let blocks = self.blocks.read();
        let genesis = blocks
            .first()
            .ok_or_else(|| ChainError::InvalidGenesis("chain has no blocks".to_string()))?;

        if !genesis.is_genesis() || genesis.previous_hash() != GENESIS_PREVIOUS_HASH {
            return Err(ChainError::InvalidGenesis(format!(
                "index {} with previous hash {}",
                genesis.index(),
                genesis.previous_hash()
            )));
        }
        genesis
            .verify_integrity()
            .map_err(|source| ChainError::InvalidBlock { index: 0, source })?;

        for pair in blocks.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            if block.index() != prev.index() + 1 || block.previous_hash() != prev.hash() {
                return Err(ChainError::BrokenLink {
                    index: block.index(),
                });
            }
            block.validate().map_err(|source| ChainError::InvalidBlock {
                index: block.index(),
                source,
            })?;
        }
        Ok(())
    }
}

impl ChainView for Chain {
    fn tip(&self) -> ChainTip {
        Chain::tip(self)
    }
}
