//! Proof-of-Work
//!
//! Searches nonces until the block hash has the required number of leading
//! zero hex digits. The search has no iteration bound; it ends when a hash
//! qualifies or when the round signal is observed set, which is checked once
//! per attempt.

use medchain_core::{hash_meets_difficulty, Block, BlockError};
use tracing::debug;

use super::signal::RoundSignal;

const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

/// Result of a proof-of-work search
#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    /// The block's hash meets the difficulty
    Sealed(Block),
    /// The round signal was set before a solution was found
    Cancelled,
}

impl MiningOutcome {
    pub fn is_sealed(&self) -> bool {
        matches!(self, MiningOutcome::Sealed(_))
    }
}

pub struct ProofOfWork;

impl ProofOfWork {
    /// Seal `block` at `difficulty`, or give up once `signal` is set.
    pub fn mine(
        mut block: Block,
        difficulty: u32,
        signal: &RoundSignal,
    ) -> Result<MiningOutcome, BlockError> {
        let mut attempts: u64 = 0;
        while !signal.is_set() {
            if hash_meets_difficulty(block.refresh_hash()?, difficulty) {
                debug!(index = block.index(), nonce = block.nonce(), attempts, "Found valid block");
                return Ok(MiningOutcome::Sealed(block));
            }

            block.increment_nonce();
            attempts += 1;
            if attempts % PROGRESS_LOG_INTERVAL == 0 {
                debug!(index = block.index(), attempts, "Mining in progress");
            }
        }

        Ok(MiningOutcome::Cancelled)
    }
}
