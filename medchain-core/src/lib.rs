// MedChain Core Library

// Enforce panic-free code in production
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), warn(clippy::panic))]
// Test-specific allows
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod crypto;
pub mod encoding;
pub mod error;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_common;

pub use crypto::signature::{Ed25519Scheme, SignatureError, SignatureScheme, SignatureType};
pub use encoding::{sha256_hex, to_canonical_bytes, EncodingError};
pub use error::{LedgerError, LedgerResult};
pub use types::block::{hash_meets_difficulty, Block, BlockError, GENESIS_PREVIOUS_HASH};
pub use types::report::{HealthReport, PoolEntry, ReportError, Vitals};
pub use util::merkle::{compute_merkle_root, MerkleError, MerkleProof, MerkleTree};
