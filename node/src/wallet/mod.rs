//! Participant key holders.
//!
//! Doctors sign the reports they author; patients only carry an identity.

use medchain_core::crypto::Keypair;
use medchain_core::{Ed25519Scheme, HealthReport, ReportError, SignatureError, SignatureScheme};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;

pub struct DoctorWallet {
    doctor_id: String,
    keys: Keypair,
    public_key_serialized: String,
    scheme: Ed25519Scheme,
}

impl DoctorWallet {
    pub fn new(doctor_id: impl Into<String>) -> Self {
        Self::generate(doctor_id, &mut OsRng)
    }

    pub fn generate<R: RngCore + CryptoRng>(doctor_id: impl Into<String>, rng: &mut R) -> Self {
        let scheme = Ed25519Scheme::new();
        let keys = Ed25519Scheme::generate_keypair(rng);
        let public_key_serialized = scheme.serialize_public_key(&keys.public_key);
        Self {
            doctor_id: doctor_id.into(),
            keys,
            public_key_serialized,
            scheme,
        }
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn public_key(&self) -> &[u8] {
        &self.keys.public_key
    }

    /// Public key in the form embedded in reports
    pub fn public_key_serialized(&self) -> &str {
        &self.public_key_serialized
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        self.scheme.sign(&self.keys.private_key, message)
    }

    /// Stamp the report with this doctor's identity and key, then sign it
    pub fn sign_report(&self, report: &mut HealthReport) -> Result<(), ReportError> {
        report.doctor_id = self.doctor_id.clone();
        report.doctor_public_key_serialized = Some(self.public_key_serialized.clone());
        report.sign(&self.scheme, &self.keys.private_key)
    }
}

impl fmt::Debug for DoctorWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoctorWallet")
            .field("doctor_id", &self.doctor_id)
            .field("public_key", &self.public_key_serialized)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DoctorWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self
            .public_key_serialized
            .get(..10)
            .unwrap_or(&self.public_key_serialized);
        write!(f, "DoctorWallet(ID: {}, Public Key: {}...)", self.doctor_id, prefix)
    }
}

#[derive(Debug)]
pub struct PatientWallet {
    patient_id: String,
    keys: Keypair,
}

impl PatientWallet {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            keys: Ed25519Scheme::generate_keypair(&mut OsRng),
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn public_key(&self) -> &[u8] {
        &self.keys.public_key
    }
}
