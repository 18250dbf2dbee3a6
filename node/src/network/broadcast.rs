use medchain_core::{Block, HealthReport, MerkleTree, SignatureScheme};
use miner::{BlockBroadcaster, BroadcastOutcome, RoundSignal};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blockchain::Chain;
use crate::history::HistorySink;

/// Consensus gate for sealed blocks.
///
/// Each report in a submitted block is re-verified independently of the
/// worker that sealed it; the block is accepted when at least half of its
/// reports verify. Whatever the verdict, the round ends.
pub struct NodeNetwork {
    chain: Arc<Chain>,
    history: Arc<dyn HistorySink>,
    scheme: Arc<dyn SignatureScheme>,
    gate: Mutex<()>,
}

impl NodeNetwork {
    pub fn new(
        chain: Arc<Chain>,
        history: Arc<dyn HistorySink>,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Self {
        Self {
            chain,
            history,
            scheme,
            gate: Mutex::new(()),
        }
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    /// Number of reports in `block` whose signatures verify
    pub fn count_valid(&self, block: &Block) -> usize {
        let scheme = self.scheme.as_ref();
        block
            .transactions()
            .par_iter()
            .filter(|report| {
                let valid = report.verify_signature(scheme);
                if !valid {
                    warn!(
                        block = %short_hash(block.hash()),
                        doctor_id = %report.doctor_id,
                        "Invalid report detected in block. Vote against."
                    );
                }
                valid
            })
            .count()
    }

    /// Majority rule: ties go to acceptance
    pub fn is_accepted(valid: usize, total: usize) -> bool {
        valid * 2 >= total
    }

    fn decide(&self, block: Block) -> BroadcastOutcome {
        let short = short_hash(block.hash()).to_string();
        info!(block = %short, "Broadcasting block {}...", short);

        let total = block.transactions().len();
        let valid = self.count_valid(&block);

        if !Self::is_accepted(valid, total) {
            warn!(
                block = %short,
                valid,
                total,
                "Block {}... rejected due to insufficient valid reports ({}/{})",
                short,
                valid,
                total
            );
            return BroadcastOutcome::Rejected { valid, total };
        }

        let hash = block.hash().to_string();
        let reports: Vec<HealthReport> = block.transactions().to_vec();
        let tree = match MerkleTree::new(&reports) {
            Ok(tree) => Some(tree),
            Err(e) => {
                warn!(block = %short, error = %e, "Cannot build inclusion proofs");
                None
            }
        };
        if let Err(e) = self.chain.append_if_tip(block) {
            warn!(block = %short, error = %e, "Block no longer extends the chain tip; discarding");
            return BroadcastOutcome::Stale;
        }

        info!(
            block = %short,
            valid,
            total,
            "Block {}... added to blockchain by majority (valid reports: {}/{})",
            short,
            valid,
            total
        );
        for (i, report) in reports.iter().enumerate() {
            match tree.as_ref().and_then(|tree| tree.create_proof(i).ok()) {
                Some(proof) => self.history.record_committed(report, &hash, &proof),
                None => self.history.record(report, &hash),
            }
        }
        BroadcastOutcome::Accepted { valid, total }
    }
}

impl BlockBroadcaster for NodeNetwork {
    fn broadcast(&self, block: Block, signal: &RoundSignal) -> BroadcastOutcome {
        let _gate = self.gate.lock();

        let outcome = if signal.is_set() {
            info!(
                block = %short_hash(block.hash()),
                "Round already decided; discarding late block"
            );
            BroadcastOutcome::Stale
        } else {
            self.decide(block)
        };

        signal.set();
        outcome
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}
