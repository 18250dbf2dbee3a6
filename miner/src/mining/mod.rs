pub mod coordinator;
pub mod pow;
pub mod signal;
pub mod template;
pub mod worker;

pub use coordinator::{Miner, RoundSummary};
pub use pow::{MiningOutcome, ProofOfWork};
pub use signal::RoundSignal;
pub use template::{BlockTemplate, ChainTip, ChainView, MempoolInterface, Selection};
pub use worker::{
    BlockBroadcaster, BroadcastOutcome, MiningWorker, PreemptionPolicy, ShortBatchPolicy,
    WorkerConfig, WorkerOutcome,
};

#[cfg(test)]
pub(crate) mod test_support;
