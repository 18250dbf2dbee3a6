// MedChain Node Library

// Enforce panic-free code in production
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
// Test-specific allows
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod blockchain;
pub mod config;
pub mod history;
pub mod logging;
pub mod mempool;
pub mod network;
pub mod simulation;
pub mod wallet;

pub use crate::blockchain::{Chain, ChainError};
pub use crate::config::{ConfigValidationError, NodeConfig};
pub use crate::history::{HistoryEntry, HistorySink, PatientHistoryTracker};
pub use crate::mempool::{MempoolError, TransactionPool};
pub use crate::network::NodeNetwork;
pub use crate::simulation::{ReportGenerator, Simulation, SimulationError, SimulationStats};
pub use crate::wallet::{DoctorWallet, PatientWallet};
