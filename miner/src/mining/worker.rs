use medchain_core::{Block, BlockError, SignatureScheme};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pow::{MiningOutcome, ProofOfWork};
use super::signal::RoundSignal;
use super::template::{BlockTemplate, ChainView, MempoolInterface};

/// What happens to a candidate's reports when the worker loses the round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreemptionPolicy {
    /// Discard them along with the candidate
    #[default]
    Drop,
    /// Return them to the pool
    Requeue,
}

/// What happens to verified reports when a batch has too few of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortBatchPolicy {
    /// Only the unexamined leftovers go back; the verified reports are discarded
    #[default]
    Drop,
    /// Verified reports go back to the pool ahead of the leftovers
    Requeue,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Valid reports required per block
    pub block_size: usize,
    /// Entries drained per attempt; larger than `block_size` to absorb invalid ones
    pub pull_size: usize,
    /// Leading zero hex digits required of a block hash
    pub difficulty: u32,
    /// Pause before retrying after an insufficient batch
    pub backoff: Duration,
    pub preemption_policy: PreemptionPolicy,
    pub short_batch_policy: ShortBatchPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            block_size: 10,
            pull_size: 20,
            difficulty: 3,
            backoff: Duration::from_millis(500),
            preemption_policy: PreemptionPolicy::Drop,
            short_batch_policy: ShortBatchPolicy::Drop,
        }
    }
}

/// Verdict of the consensus gate on a sealed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Appended to the chain
    Accepted { valid: usize, total: usize },
    /// Too few reports passed re-verification
    Rejected { valid: usize, total: usize },
    /// The round was already decided or the chain tip moved
    Stale,
}

impl BroadcastOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BroadcastOutcome::Accepted { .. })
    }
}

/// Submission point for sealed blocks
pub trait BlockBroadcaster: Send + Sync {
    /// Decide on `block` and end the round by setting `signal`
    fn broadcast(&self, block: Block, signal: &RoundSignal) -> BroadcastOutcome;
}

/// How a worker's round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Sealed a block and handed it to the gate
    Broadcast(BroadcastOutcome),
    /// A sibling decided the round while this worker was sealing
    Preempted,
    /// The round was over before this worker started a candidate
    Stopped,
}

/// One competitor in a mining round.
///
/// `run` is blocking: it drains the pool, filters the batch by signature,
/// seals a candidate on top of the current tip and submits it. It only
/// returns once the round's signal is set or its own block was broadcast.
pub struct MiningWorker {
    worker_id: usize,
    config: WorkerConfig,
    mempool: Arc<dyn MempoolInterface>,
    chain: Arc<dyn ChainView>,
    broadcaster: Arc<dyn BlockBroadcaster>,
    scheme: Arc<dyn SignatureScheme>,
}

impl MiningWorker {
    pub fn new(
        worker_id: usize,
        config: WorkerConfig,
        mempool: Arc<dyn MempoolInterface>,
        chain: Arc<dyn ChainView>,
        broadcaster: Arc<dyn BlockBroadcaster>,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Self {
        Self {
            worker_id,
            config,
            mempool,
            chain,
            broadcaster,
            scheme,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn run(&self, signal: &RoundSignal) -> Result<WorkerOutcome, BlockError> {
        let block_size = self.config.block_size;

        loop {
            if signal.is_set() {
                info!(worker = self.worker_id, "Stopped: another miner already mined the block");
                return Ok(WorkerOutcome::Stopped);
            }

            let drained = self.mempool.take(self.config.pull_size);
            if drained.len() < block_size {
                debug!(
                    worker = self.worker_id,
                    available = drained.len(),
                    required = block_size,
                    "Not enough reports in pool"
                );
                if !drained.is_empty() {
                    self.mempool.restore(drained);
                }
                self.back_off();
                continue;
            }

            let mut selection =
                BlockTemplate::select_transactions(drained, block_size, self.scheme.as_ref());
            if !selection.is_complete(block_size) {
                debug!(
                    worker = self.worker_id,
                    valid = selection.selected.len(),
                    discarded = selection.invalid,
                    "Not enough valid reports in batch"
                );
                let returned = match self.config.short_batch_policy {
                    ShortBatchPolicy::Drop => selection.leftovers,
                    ShortBatchPolicy::Requeue => selection.into_restorable(),
                };
                if !returned.is_empty() {
                    self.mempool.restore(returned);
                }
                self.back_off();
                continue;
            }

            let leftovers = std::mem::take(&mut selection.leftovers);
            if !leftovers.is_empty() {
                self.mempool.restore(leftovers);
            }

            let tip = self.chain.tip();
            let template = BlockTemplate::new(&tip, selection, self.config.difficulty);
            let candidate = template.create_block()?;

            info!(worker = self.worker_id, index = template.index(), "Mining started");
            return match ProofOfWork::mine(candidate, self.config.difficulty, signal)? {
                MiningOutcome::Sealed(block) => {
                    info!(
                        worker = self.worker_id,
                        index = block.index(),
                        reports = block.transactions().len(),
                        "Block #{} mined by Miner {}",
                        block.index(),
                        self.worker_id
                    );
                    debug!("\n{}", block);

                    let outcome = self.broadcaster.broadcast(block, signal);
                    if outcome == BroadcastOutcome::Stale {
                        self.release(template);
                    }
                    Ok(WorkerOutcome::Broadcast(outcome))
                }
                MiningOutcome::Cancelled => {
                    info!(worker = self.worker_id, "Preempted: another miner sealed first");
                    self.release(template);
                    Ok(WorkerOutcome::Preempted)
                }
            };
        }
    }

    /// Apply the preemption policy to a candidate that will not be recorded
    fn release(&self, template: BlockTemplate) {
        match self.config.preemption_policy {
            PreemptionPolicy::Drop => {
                warn!(
                    worker = self.worker_id,
                    reports = template.report_count(),
                    "Discarding candidate reports"
                );
            }
            PreemptionPolicy::Requeue => {
                debug!(
                    worker = self.worker_id,
                    reports = template.report_count(),
                    "Returning candidate reports to pool"
                );
                self.mempool.restore(template.into_entries());
            }
        }
    }

    fn back_off(&self) {
        thread::sleep(self.config.backoff);
    }
}
