use medchain_core::{Block, BlockError, HealthReport, PoolEntry, SignatureScheme};
use tracing::warn;

/// Staging area the workers drain reports from
pub trait MempoolInterface: Send + Sync {
    /// Atomically remove up to `count` entries from the head
    fn take(&self, count: usize) -> Vec<PoolEntry>;

    /// Return entries a worker could not use
    fn restore(&self, entries: Vec<PoolEntry>);

    fn size(&self) -> usize;
}

/// Index and hash of the last block in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    pub index: u64,
    pub hash: String,
}

/// Read access to the chain tip
pub trait ChainView: Send + Sync {
    fn tip(&self) -> ChainTip;
}

/// Outcome of filtering a drained batch
#[derive(Debug, Default)]
pub struct Selection {
    /// Verified reports, in pool order
    pub selected: Vec<HealthReport>,
    /// Pool entries the selected reports were decoded from
    pub selected_entries: Vec<PoolEntry>,
    /// Entries not examined because the target was already reached
    pub leftovers: Vec<PoolEntry>,
    /// Entries discarded for a bad signature or an undecodable payload
    pub invalid: usize,
}

impl Selection {
    pub fn is_complete(&self, target: usize) -> bool {
        self.selected.len() >= target
    }

    /// Entries that should go back to the pool when the batch is abandoned
    pub fn into_restorable(self) -> Vec<PoolEntry> {
        let mut entries = self.selected_entries;
        entries.extend(self.leftovers);
        entries
    }
}

/// A candidate block's contents before proof-of-work
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    index: u64,
    previous_hash: String,
    difficulty: u32,
    reports: Vec<HealthReport>,
    entries: Vec<PoolEntry>,
}

impl BlockTemplate {
    /// Verify drained entries in order and keep up to `target` valid reports.
    ///
    /// Invalid or undecodable entries are dropped for good. Once the target is
    /// reached the remaining entries are left unexamined.
    pub fn select_transactions(
        entries: Vec<PoolEntry>,
        target: usize,
        scheme: &dyn SignatureScheme,
    ) -> Selection {
        let mut selection = Selection::default();
        let mut remaining = entries.into_iter();

        for entry in remaining.by_ref() {
            match HealthReport::from_entry(&entry) {
                Ok(report) if report.verify_signature(scheme) => {
                    selection.selected.push(report);
                    selection.selected_entries.push(entry);
                }
                Ok(report) => {
                    warn!(doctor_id = %report.doctor_id, "Invalid signature for report. Skipping.");
                    selection.invalid += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Undecodable pool entry. Skipping.");
                    selection.invalid += 1;
                }
            }
            if selection.selected.len() >= target {
                break;
            }
        }

        selection.leftovers = remaining.collect();
        selection
    }

    /// Template extending `tip` with the selected reports
    pub fn new(tip: &ChainTip, selection: Selection, difficulty: u32) -> Self {
        Self {
            index: tip.index + 1,
            previous_hash: tip.hash.clone(),
            difficulty,
            reports: selection.selected,
            entries: selection.selected_entries,
        }
    }

    pub fn create_block(&self) -> Result<Block, BlockError> {
        Block::new(
            self.index,
            self.reports.clone(),
            self.previous_hash.clone(),
            self.difficulty,
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    /// Pool entries backing this template, for requeueing
    pub fn into_entries(self) -> Vec<PoolEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::{Ed25519Scheme, Vitals};
    use rand::rngs::OsRng;

    fn signed_entry(scheme: &Ed25519Scheme, patient: &str) -> PoolEntry {
        let keys = Ed25519Scheme::generate_keypair(&mut OsRng);
        let vitals = Vitals {
            blood_pressure: "120/80".to_string(),
            heart_rate: 70,
            spo2: "99%".to_string(),
            temperature: "98.4 F".to_string(),
        };
        let mut report = HealthReport::new(patient, "doctor_1", "fever", "cold", vitals, "No critical signs.")
            .with_public_key(scheme.serialize_public_key(&keys.public_key));
        report.sign(scheme, &keys.private_key).unwrap();
        report.to_entry().unwrap()
    }

    fn forged_entry(scheme: &Ed25519Scheme, patient: &str) -> PoolEntry {
        let mut entry = signed_entry(scheme, patient);
        entry["diagnosis"] = serde_json::json!("forged");
        entry
    }

    #[test]
    fn test_selection_stops_at_target() {
        let scheme = Ed25519Scheme::new();
        let entries: Vec<_> = (0..5).map(|i| signed_entry(&scheme, &format!("p{i}"))).collect();

        let selection = BlockTemplate::select_transactions(entries, 3, &scheme);
        assert_eq!(selection.selected.len(), 3);
        assert_eq!(selection.leftovers.len(), 2);
        assert_eq!(selection.invalid, 0);
        assert!(selection.is_complete(3));
        assert_eq!(selection.selected[0].patient_id, "p0");
        assert_eq!(selection.leftovers[0]["patient_id"], "p3");
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let scheme = Ed25519Scheme::new();
        let entries = vec![
            signed_entry(&scheme, "p0"),
            forged_entry(&scheme, "p1"),
            serde_json::json!({"patient_id": "p2"}),
            signed_entry(&scheme, "p3"),
        ];

        let selection = BlockTemplate::select_transactions(entries, 3, &scheme);
        assert_eq!(selection.selected.len(), 2);
        assert_eq!(selection.invalid, 2);
        assert!(selection.leftovers.is_empty());
        assert!(!selection.is_complete(3));

        let restorable = selection.into_restorable();
        assert_eq!(restorable.len(), 2);
        assert_eq!(restorable[0]["patient_id"], "p0");
        assert_eq!(restorable[1]["patient_id"], "p3");
    }

    #[test]
    fn test_template_extends_tip() {
        let scheme = Ed25519Scheme::new();
        let entries: Vec<_> = (0..2).map(|i| signed_entry(&scheme, &format!("p{i}"))).collect();
        let selection = BlockTemplate::select_transactions(entries, 2, &scheme);

        let tip = ChainTip {
            index: 4,
            hash: "00ff".repeat(16),
        };
        let template = BlockTemplate::new(&tip, selection, 2);
        assert_eq!(template.index(), 5);
        assert_eq!(template.report_count(), 2);

        let block = template.create_block().unwrap();
        assert_eq!(block.index(), 5);
        assert_eq!(block.previous_hash(), tip.hash);
        assert_eq!(block.difficulty(), 2);
        assert_eq!(block.nonce(), 0);
        assert_eq!(template.into_entries().len(), 2);
    }
}
