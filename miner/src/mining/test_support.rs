//! In-memory collaborators for exercising workers and rounds

#![cfg(test)]

use medchain_core::{Block, Ed25519Scheme, HealthReport, PoolEntry, SignatureScheme, Vitals};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::signal::RoundSignal;
use super::template::{ChainTip, ChainView, MempoolInterface};
use super::worker::{BlockBroadcaster, BroadcastOutcome};

#[derive(Default)]
pub struct MockPool {
    entries: Mutex<VecDeque<PoolEntry>>,
    takes: AtomicUsize,
}

impl MockPool {
    pub fn with_entries(entries: Vec<PoolEntry>) -> Self {
        Self {
            entries: Mutex::new(entries.into()),
            takes: AtomicUsize::new(0),
        }
    }

    pub fn take_count(&self) -> usize {
        self.takes.load(Ordering::SeqCst)
    }
}

impl MempoolInterface for MockPool {
    fn take(&self, count: usize) -> Vec<PoolEntry> {
        self.takes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();
        let n = count.min(entries.len());
        entries.drain(..n).collect()
    }

    fn restore(&self, restored: Vec<PoolEntry>) {
        self.entries.lock().extend(restored);
    }

    fn size(&self) -> usize {
        self.entries.lock().len()
    }
}

pub struct FixedChain(ChainTip);

impl FixedChain {
    pub const TIP_HASH: &'static str =
        "00a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f";

    pub fn genesis_like() -> Self {
        Self(ChainTip {
            index: 0,
            hash: Self::TIP_HASH.to_string(),
        })
    }
}

impl ChainView for FixedChain {
    fn tip(&self) -> ChainTip {
        self.0.clone()
    }
}

enum Verdict {
    Accept,
    Stale,
}

/// Broadcaster that records what it was given and always ends the round
pub struct RecordingBroadcaster {
    verdict: Verdict,
    blocks: Mutex<Vec<Block>>,
}

impl RecordingBroadcaster {
    pub fn accepting() -> Self {
        Self {
            verdict: Verdict::Accept,
            blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn stale() -> Self {
        Self {
            verdict: Verdict::Stale,
            blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().clone()
    }
}

impl BlockBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, block: Block, signal: &RoundSignal) -> BroadcastOutcome {
        let mut blocks = self.blocks.lock();
        if !signal.set() {
            return BroadcastOutcome::Stale;
        }
        match self.verdict {
            Verdict::Accept => {
                let total = block.transactions().len();
                blocks.push(block);
                BroadcastOutcome::Accepted { valid: total, total }
            }
            Verdict::Stale => BroadcastOutcome::Stale,
        }
    }
}

pub fn signed_entries(count: usize) -> Vec<PoolEntry> {
    let scheme = Ed25519Scheme::new();
    (0..count)
        .map(|i| {
            let keys = Ed25519Scheme::generate_keypair(&mut OsRng);
            let vitals = Vitals {
                blood_pressure: "118/76".to_string(),
                heart_rate: 64 + i as u32,
                spo2: "97%".to_string(),
                temperature: "98.2 F".to_string(),
            };
            let mut report = HealthReport::new(
                format!("patient_{i}"),
                "doctor_2",
                "headache",
                "migraine",
                vitals,
                "Advised hydration and monitoring.",
            )
            .with_public_key(scheme.serialize_public_key(&keys.public_key));
            report.sign(&scheme, &keys.private_key).unwrap();
            report.to_entry().unwrap()
        })
        .collect()
}

/// A signed entry whose content was altered after signing
pub fn forged_entry() -> PoolEntry {
    let mut entry = signed_entries(1).remove(0);
    entry["notes"] = serde_json::json!("Altered after signing.");
    entry
}
