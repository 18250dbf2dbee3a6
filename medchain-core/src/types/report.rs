//! Health reports, the transactions recorded by the ledger.
//!
//! A report is a closed record: the ledger never interprets the clinical
//! fields, it only encodes them canonically for hashing and signing. The
//! signature is held as raw bytes in memory; on the wire it is base64 text.
//! Decoding also accepts the legacy array-of-byte-values form and normalizes
//! both to raw bytes immediately.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::crypto::signature::{SignatureError, SignatureScheme};
use crate::encoding::{ensure_finite, to_canonical_bytes, EncodingError};
use crate::types::unix_timestamp;

/// Serialized report awaiting selection in the transaction pool
pub type PoolEntry = serde_json::Value;

/// Report-related errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Malformed report: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// Vital signs captured during an encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(rename = "BP")]
    pub blood_pressure: String,
    #[serde(rename = "HR")]
    pub heart_rate: u32,
    #[serde(rename = "SpO2")]
    pub spo2: String,
    #[serde(rename = "Temp")]
    pub temperature: String,
}

impl fmt::Display for Vitals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BP: {}, HR: {}, SpO2: {}, Temp: {}",
            self.blood_pressure, self.heart_rate, self.spo2, self.temperature
        )
    }
}

/// A signed medical encounter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub patient_id: String,
    pub doctor_id: String,
    pub symptoms: String,
    pub diagnosis: String,
    pub vitals: Vitals,
    pub notes: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Author public key in the signature scheme's textual form
    pub doctor_public_key_serialized: Option<String>,
    #[serde(default, with = "signature_serde")]
    pub signature: Option<Vec<u8>>,
}

/// Every field except the signature; this is what gets signed.
#[derive(Serialize)]
struct SigningPayload<'a> {
    patient_id: &'a str,
    doctor_id: &'a str,
    symptoms: &'a str,
    diagnosis: &'a str,
    vitals: &'a Vitals,
    notes: &'a str,
    timestamp: f64,
    doctor_public_key_serialized: Option<&'a str>,
}

impl HealthReport {
    /// Create an unsigned report stamped with the current time
    pub fn new(
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        symptoms: impl Into<String>,
        diagnosis: impl Into<String>,
        vitals: Vitals,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            symptoms: symptoms.into(),
            diagnosis: diagnosis.into(),
            vitals,
            notes: notes.into(),
            timestamp: unix_timestamp(),
            doctor_public_key_serialized: None,
            signature: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_public_key(mut self, serialized: impl Into<String>) -> Self {
        self.doctor_public_key_serialized = Some(serialized.into());
        self
    }

    /// Canonical bytes of the report without its signature
    pub fn message_for_signing(&self) -> Result<Vec<u8>, EncodingError> {
        let payload = SigningPayload {
            patient_id: &self.patient_id,
            doctor_id: &self.doctor_id,
            symptoms: &self.symptoms,
            diagnosis: &self.diagnosis,
            vitals: &self.vitals,
            notes: &self.notes,
            timestamp: ensure_finite("timestamp", self.timestamp)?,
            doctor_public_key_serialized: self.doctor_public_key_serialized.as_deref(),
        };
        to_canonical_bytes(&payload)
    }

    /// Canonical bytes of the complete report, signature included
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        ensure_finite("timestamp", self.timestamp)?;
        to_canonical_bytes(self)
    }

    /// Sign the report with the author's private key
    pub fn sign(
        &mut self,
        scheme: &dyn SignatureScheme,
        private_key: &[u8],
    ) -> Result<(), ReportError> {
        let message = self.message_for_signing()?;
        self.signature = Some(scheme.sign(private_key, &message)?);
        Ok(())
    }

    /// Verify the signature, surfacing why verification could not run
    pub fn try_verify(&self, scheme: &dyn SignatureScheme) -> Result<bool, ReportError> {
        let signature = match self.signature.as_deref() {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(SignatureError::MissingSignature.into()),
        };
        let encoded_key = self
            .doctor_public_key_serialized
            .as_deref()
            .ok_or(SignatureError::MissingPublicKey)?;

        let public_key = scheme.deserialize_public_key(encoded_key)?;
        let message = self.message_for_signing()?;
        Ok(scheme.verify(&public_key, &message, signature)?)
    }

    /// Verify the signature. Any provider error counts as a failed verification.
    pub fn verify_signature(&self, scheme: &dyn SignatureScheme) -> bool {
        match self.try_verify(scheme) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(doctor_id = %self.doctor_id, error = %e, "Error verifying report signature");
                false
            }
        }
    }

    /// Serialize to the flat keyed pool/wire form
    pub fn to_entry(&self) -> Result<PoolEntry, ReportError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode the pool/wire form, normalizing the signature to raw bytes
    pub fn from_entry(entry: &PoolEntry) -> Result<Self, ReportError> {
        Ok(Self::deserialize(entry)?)
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "     Doctor    : {}", self.doctor_id)?;
        writeln!(f, "     Symptoms  : {}", self.symptoms)?;
        writeln!(f, "     Diagnosis : {}", self.diagnosis)?;
        writeln!(f, "     Vitals    : {}", self.vitals)?;
        write!(f, "     Notes     : {}", self.notes)
    }
}

mod signature_serde {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Legacy(Vec<u8>),
    }

    pub fn serialize<S>(signature: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match signature {
            Some(bytes) if !bytes.is_empty() => serializer.serialize_str(&STANDARD.encode(bytes)),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = match Option::<Repr>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(Repr::Text(text)) => STANDARD.decode(text.trim()).map_err(de::Error::custom)?,
            Some(Repr::Legacy(bytes)) => bytes,
        };
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }
}
