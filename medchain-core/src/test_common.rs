//! Common test utilities for the medchain-core crate

#![cfg(test)]

pub use crate::crypto::signature::{Ed25519Scheme, Keypair, SignatureScheme};
pub use crate::types::report::{HealthReport, Vitals};

// Test-specific utilities
pub mod prelude {
    pub use super::*;
    use rand::rngs::OsRng;

    /// Fixed timestamp so hashes are reproducible inside a test
    pub const TEST_TIMESTAMP: f64 = 1_718_000_000.25;

    pub fn sample_vitals() -> Vitals {
        Vitals {
            blood_pressure: "120/80".to_string(),
            heart_rate: 72,
            spo2: "98%".to_string(),
            temperature: "98.6 F".to_string(),
        }
    }

    /// Create an unsigned report for `patient_id`
    pub fn sample_report(patient_id: &str) -> HealthReport {
        HealthReport::new(
            patient_id,
            "doctor_0",
            "cough",
            "flu",
            sample_vitals(),
            "Prescribed rest and fluids.",
        )
        .with_timestamp(TEST_TIMESTAMP)
    }

    /// Create a report signed by a freshly generated doctor key
    pub fn signed_report(patient_id: &str, scheme: &Ed25519Scheme) -> (HealthReport, Keypair) {
        let keys = Ed25519Scheme::generate_keypair(&mut OsRng);
        let mut report =
            sample_report(patient_id).with_public_key(scheme.serialize_public_key(&keys.public_key));
        report.sign(scheme, &keys.private_key).unwrap();
        (report, keys)
    }
}
