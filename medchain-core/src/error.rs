//! Unified error handling for MedChain
//!
//! Every component reports failures through its own `thiserror` enum; this
//! module gathers them under [`LedgerError`] so callers that cross component
//! boundaries can use a single `?`-friendly result type.

use thiserror::Error;

pub use crate::crypto::signature::SignatureError;
pub use crate::encoding::EncodingError;
pub use crate::types::block::BlockError;
pub use crate::types::report::ReportError;
pub use crate::util::merkle::MerkleError;

/// Main error type for the MedChain ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Block-related errors
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    /// Health report errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] SignatureError),

    /// Canonical encoding errors
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Merkle tree errors
    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        LedgerError::Internal(msg.into())
    }

    /// Whether the failure concerns a single transaction and can be handled by
    /// excluding that transaction.
    pub fn is_transaction_local(&self) -> bool {
        matches!(self, LedgerError::Report(_) | LedgerError::Crypto(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: LedgerError = SignatureError::InvalidKey("short".to_string()).into();
        assert!(matches!(err, LedgerError::Crypto(_)));
        assert!(err.is_transaction_local());
        assert!(err.to_string().contains("Invalid key"));
    }

    #[test]
    fn test_block_errors_are_not_transaction_local() {
        let err: LedgerError = BlockError::InvalidPreviousHash {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        }
        .into();
        assert!(!err.is_transaction_local());

        let err = LedgerError::internal("boom");
        assert_eq!(err.to_string(), "Internal error: boom");
    }
}
