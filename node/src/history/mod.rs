//! Per-patient record of every report the chain has accepted

use dashmap::DashMap;
use medchain_core::{sha256_hex, HealthReport, MerkleProof, MerkleTree};
use std::fmt::Write;
use tracing::{debug, warn};

/// Receives each report of an accepted block, in block order
pub trait HistorySink: Send + Sync {
    fn record(&self, report: &HealthReport, block_hash: &str);

    /// Record a report along with its inclusion proof against the block's Merkle root
    fn record_committed(&self, report: &HealthReport, block_hash: &str, _proof: &MerkleProof) {
        self.record(report, block_hash);
    }
}

/// A report together with the block that committed it
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub report: HealthReport,
    pub block_hash: String,
    /// Absent when the entry was recorded without a proof
    pub proof: Option<MerkleProof>,
}

impl HistoryEntry {
    /// Check that this report is committed under `merkle_root`.
    ///
    /// The proof must start from this report's own leaf digest and fold up to
    /// exactly the given root.
    pub fn verify_inclusion(&self, merkle_root: &str) -> bool {
        let Some(proof) = &self.proof else {
            return false;
        };
        let leaf = match self.report.canonical_bytes() {
            Ok(bytes) => sha256_hex(bytes),
            Err(e) => {
                warn!(error = %e, "Cannot encode history entry");
                return false;
            }
        };
        proof.leaf_hash == leaf && proof.root_hash == merkle_root && MerkleTree::verify_proof(proof)
    }
}

#[derive(Debug, Default)]
pub struct PatientHistoryTracker {
    history: DashMap<String, Vec<HistoryEntry>>,
}

impl PatientHistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted reports for `patient_id`, oldest first
    pub fn get_history(&self, patient_id: &str) -> Vec<HistoryEntry> {
        self.history
            .get(patient_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn patient_count(&self) -> usize {
        self.history.len()
    }

    pub fn total_records(&self) -> usize {
        self.history.iter().map(|entry| entry.value().len()).sum()
    }

    /// Human-readable history listing for the interactive query
    pub fn format_history(&self, patient_id: &str) -> String {
        let entries = self.get_history(patient_id);
        if entries.is_empty() {
            return format!("No records found for {patient_id}");
        }

        let mut out = format!("Patient History for {patient_id}:\n");
        for (i, entry) in entries.iter().enumerate() {
            let short_hash = entry.block_hash.get(..10).unwrap_or(&entry.block_hash);
            // Writing to a String cannot fail
            let _ = write!(
                out,
                "\n  Report #{} (block {}...)\n{}\n",
                i + 1,
                short_hash,
                entry.report
            );
        }
        out
    }
}

impl PatientHistoryTracker {
    fn push(&self, report: &HealthReport, block_hash: &str, proof: Option<MerkleProof>) {
        debug!(patient_id = %report.patient_id, block = %block_hash, "Recording report");
        self.history
            .entry(report.patient_id.clone())
            .or_default()
            .push(HistoryEntry {
                report: report.clone(),
                block_hash: block_hash.to_string(),
                proof,
            });
    }
}

impl HistorySink for PatientHistoryTracker {
    fn record(&self, report: &HealthReport, block_hash: &str) {
        self.push(report, block_hash, None);
    }

    fn record_committed(&self, report: &HealthReport, block_hash: &str, proof: &MerkleProof) {
        self.push(report, block_hash, Some(proof.clone()));
    }
}
