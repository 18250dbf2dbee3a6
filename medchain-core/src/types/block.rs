use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::encoding::{ensure_finite, sha256_hex, to_canonical_bytes, EncodingError};
use crate::types::report::HealthReport;
use crate::types::unix_timestamp;
use crate::util::merkle::compute_merkle_root;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Block-related errors
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Block encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Invalid block hash: expected {expected}, got {actual}")]
    InvalidHash { expected: String, actual: String },

    #[error("Merkle root mismatch: expected {expected}, got {actual}")]
    MerkleRootMismatch { expected: String, actual: String },

    #[error("Invalid proof of work: hash {hash} does not have {difficulty} leading zeros")]
    InvalidProofOfWork { hash: String, difficulty: u32 },

    #[error("Previous hash mismatch: expected {expected}, got {actual}")]
    InvalidPreviousHash { expected: String, actual: String },

    #[error("Invalid block index: expected {expected}, got {actual}")]
    InvalidIndex { expected: u64, actual: u64 },
}

/// Whether `hash` starts with at least `difficulty` hex zero digits
pub fn hash_meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.bytes().take(required).all(|b| b == b'0')
}

/// The six fields committed to by a block hash. `merkle_root` and `hash`
/// are deliberately absent: the hash commits to the raw report list.
#[derive(Serialize)]
struct HashPayload<'a> {
    index: u64,
    timestamp: f64,
    transactions: &'a [HealthReport],
    previous_hash: &'a str,
    nonce: u64,
    difficulty: u32,
}

/// A block of health reports.
///
/// Only `nonce` and `hash` change after construction, and only while the
/// proof-of-work search is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    /// Seconds since the Unix epoch
    timestamp: f64,
    transactions: Vec<HealthReport>,
    previous_hash: String,
    merkle_root: String,
    /// Required number of leading zero hex digits
    difficulty: u32,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Create a new block stamped with the current time
    pub fn new(
        index: u64,
        transactions: Vec<HealthReport>,
        previous_hash: impl Into<String>,
        difficulty: u32,
    ) -> Result<Self, BlockError> {
        Self::with_timestamp(index, unix_timestamp(), transactions, previous_hash, difficulty)
    }

    /// Create a new block with an explicit timestamp
    pub fn with_timestamp(
        index: u64,
        timestamp: f64,
        transactions: Vec<HealthReport>,
        previous_hash: impl Into<String>,
        difficulty: u32,
    ) -> Result<Self, BlockError> {
        let mut block = Self {
            index,
            timestamp: ensure_finite("timestamp", timestamp)?,
            transactions,
            previous_hash: previous_hash.into(),
            merkle_root: String::new(),
            difficulty,
            nonce: 0,
            hash: String::new(),
        };
        block.merkle_root = block.calculate_merkle_root()?;
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// Create the genesis block: index 0, no reports, root sentinel as parent
    pub fn genesis(difficulty: u32) -> Result<Self, BlockError> {
        Self::new(0, Vec::new(), GENESIS_PREVIOUS_HASH, difficulty)
    }

    /// Calculate the hash of this block from its current fields
    pub fn compute_hash(&self) -> Result<String, BlockError> {
        let payload = HashPayload {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            difficulty: self.difficulty,
        };
        Ok(sha256_hex(to_canonical_bytes(&payload)?))
    }

    /// Calculate the Merkle root of this block's reports
    pub fn calculate_merkle_root(&self) -> Result<String, BlockError> {
        Ok(compute_merkle_root(&self.transactions)?)
    }

    /// Recompute the hash from the current nonce and store it
    pub fn refresh_hash(&mut self) -> Result<&str, BlockError> {
        self.hash = self.compute_hash()?;
        Ok(&self.hash)
    }

    /// Increment the nonce for mining
    pub fn increment_nonce(&mut self) {
        self.nonce = self.nonce.wrapping_add(1);
    }

    /// Check if the stored hash meets the block's difficulty
    pub fn meets_difficulty(&self) -> bool {
        hash_meets_difficulty(&self.hash, self.difficulty)
    }

    /// Check that the stored hash and Merkle root match the block contents
    pub fn verify_integrity(&self) -> Result<(), BlockError> {
        let expected_root = self.calculate_merkle_root()?;
        if expected_root != self.merkle_root {
            return Err(BlockError::MerkleRootMismatch {
                expected: expected_root,
                actual: self.merkle_root.clone(),
            });
        }

        let expected_hash = self.compute_hash()?;
        if expected_hash != self.hash {
            return Err(BlockError::InvalidHash {
                expected: expected_hash,
                actual: self.hash.clone(),
            });
        }
        Ok(())
    }

    /// Full check of a sealed block: integrity plus proof of work
    pub fn validate(&self) -> Result<(), BlockError> {
        self.verify_integrity()?;
        if !self.meets_difficulty() {
            return Err(BlockError::InvalidProofOfWork {
                hash: self.hash.clone(),
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[HealthReport] {
        &self.transactions
    }

    /// Consume the block, returning its reports
    pub fn into_transactions(self) -> Vec<HealthReport> {
        self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn merkle_root(&self) -> &str {
        &self.merkle_root
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.timestamp.trunc() as i64;
        let nanos = (self.timestamp.fract() * 1e9) as u32;
        let created = DateTime::<Utc>::from_timestamp(secs, nanos)
            .map(|dt| dt.format("%a %b %e %H:%M:%S %Y").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());

        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "  Timestamp   : {}", created)?;
        writeln!(f, "  Nonce       : {}", self.nonce)?;
        writeln!(f, "  Difficulty  : {}", self.difficulty)?;
        writeln!(f, "  Merkle Root : {}", self.merkle_root)?;
        writeln!(f, "  Prev Hash   : {}", self.previous_hash)?;
        writeln!(f, "  Curr Hash   : {}", self.hash)?;
        write!(f, "  Transactions: {}", self.transactions.len())
    }
}
