use medchain_core::SignatureScheme;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::signal::RoundSignal;
use super::template::{ChainView, MempoolInterface};
use super::worker::{BlockBroadcaster, BroadcastOutcome, MiningWorker, WorkerConfig, WorkerOutcome};

/// Upper bound of the random delay between worker launches
const MAX_LAUNCH_STAGGER_MS: u64 = 10;

/// Per-worker results of one round
#[derive(Debug, Clone, Default)]
pub struct RoundSummary {
    /// `(worker_id, outcome)` in launch order
    pub outcomes: Vec<(usize, WorkerOutcome)>,
    /// Workers that failed or panicked
    pub failures: usize,
    /// The round was ended by the wall-clock bound
    pub timed_out: bool,
}

impl RoundSummary {
    /// Gate verdict of the block that decided the round, if any
    pub fn decision(&self) -> Option<(usize, BroadcastOutcome)> {
        self.outcomes.iter().find_map(|(id, outcome)| match outcome {
            WorkerOutcome::Broadcast(b) if *b != BroadcastOutcome::Stale => Some((*id, *b)),
            _ => None,
        })
    }

    pub fn block_accepted(&self) -> bool {
        matches!(self.decision(), Some((_, b)) if b.is_accepted())
    }

    pub fn preempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == WorkerOutcome::Preempted)
            .count()
    }
}

/// Runs competitive mining rounds over a fixed set of workers
pub struct Miner {
    workers: Vec<Arc<MiningWorker>>,
    round_timeout: Option<Duration>,
    current_round: Mutex<Option<RoundSignal>>,
}

impl Miner {
    pub fn new(
        num_workers: usize,
        config: WorkerConfig,
        mempool: Arc<dyn MempoolInterface>,
        chain: Arc<dyn ChainView>,
        broadcaster: Arc<dyn BlockBroadcaster>,
        scheme: Arc<dyn SignatureScheme>,
    ) -> Self {
        let workers = (0..num_workers)
            .map(|id| {
                Arc::new(MiningWorker::new(
                    id,
                    config.clone(),
                    Arc::clone(&mempool),
                    Arc::clone(&chain),
                    Arc::clone(&broadcaster),
                    Arc::clone(&scheme),
                ))
            })
            .collect();

        Self {
            workers,
            round_timeout: None,
            current_round: Mutex::new(None),
        }
    }

    /// End any round that runs longer than `timeout`
    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = Some(timeout);
        self
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Run one round to completion.
    ///
    /// Every worker gets the same fresh signal. Workers start in a random
    /// order with a short random gap between launches, and the round is over
    /// once all of them have returned.
    pub async fn run_round(&self) -> RoundSummary {
        let signal = RoundSignal::new();
        *self.current_round.lock() = Some(signal.clone());

        let launches: Vec<(usize, Duration)> = {
            let mut rng = rand::thread_rng();
            let mut order: Vec<usize> = (0..self.workers.len()).collect();
            order.shuffle(&mut rng);
            order
                .into_iter()
                .map(|id| (id, Duration::from_millis(rng.gen_range(1..=MAX_LAUNCH_STAGGER_MS))))
                .collect()
        };

        let timer = self.round_timeout.map(|timeout| {
            let signal = signal.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                signal.set()
            })
        });

        let mut handles = Vec::with_capacity(launches.len());
        for (id, stagger) in launches {
            let worker = Arc::clone(&self.workers[id]);
            let worker_signal = signal.clone();
            handles.push((id, tokio::task::spawn_blocking(move || worker.run(&worker_signal))));
            info!(worker = id, "Started Miner {}", id);
            tokio::time::sleep(stagger).await;
        }

        let mut summary = RoundSummary::default();
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => summary.outcomes.push((id, outcome)),
                Ok(Err(e)) => {
                    error!(worker = id, error = %e, "Mining worker failed");
                    summary.failures += 1;
                }
                Err(e) => {
                    error!(worker = id, error = %e, "Mining task error");
                    summary.failures += 1;
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
            summary.timed_out = matches!(timer.await, Ok(true));
            if summary.timed_out {
                warn!("Mining round ended by timeout");
            }
        }

        signal.set();
        *self.current_round.lock() = None;
        summary
    }

    /// Cancel the round in progress, if any
    pub fn stop(&self) {
        if let Some(signal) = self.current_round.lock().as_ref() {
            if signal.set() {
                info!("Mining stopped");
            }
        }
    }
}
