//! Canonical encoding
//!
//! Everything that is hashed or signed goes through [`to_canonical_bytes`].
//! Values are first lowered to a `serde_json::Value`, whose object map is a
//! `BTreeMap`, so keys come out sorted at every nesting level regardless of
//! struct field order. Floats use serde_json's shortest round-trip form, so a
//! given `f64` always produces the same bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while producing canonical bytes
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// NaN and infinities have no JSON representation and would collapse to `null`
    #[error("Non-finite number in field `{0}`")]
    NonFiniteNumber(&'static str),
}

/// Serialize `value` to its canonical byte form (sorted keys, compact JSON).
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Reject NaN / infinite values before they reach the encoder.
pub fn ensure_finite(field: &'static str, value: f64) -> Result<f64, EncodingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EncodingError::NonFiniteNumber(field))
    }
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}
