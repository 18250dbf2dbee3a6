//! Mempool error types

use medchain_core::ReportError;
use thiserror::Error;

/// Result type for mempool operations
pub type MempoolResult<T> = Result<T, MempoolError>;

#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] ReportError),
}
