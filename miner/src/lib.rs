// MedChain Miner Library

// Enforce panic-free code in production
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), warn(clippy::panic))]
// Allow certain warnings for pragmatic reasons
#![allow(clippy::too_many_arguments)]
// Test-specific allows
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod mining;

pub use mining::{
    BlockBroadcaster, BlockTemplate, BroadcastOutcome, ChainTip, ChainView, MempoolInterface,
    Miner, MiningOutcome, MiningWorker, PreemptionPolicy, ProofOfWork, RoundSignal, RoundSummary,
    ShortBatchPolicy, WorkerConfig, WorkerOutcome,
};
