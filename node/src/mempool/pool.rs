use medchain_core::{HealthReport, PoolEntry};
use miner::MempoolInterface;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

use super::error::MempoolResult;

/// Thread-safe FIFO of serialized reports awaiting inclusion.
///
/// Every operation holds the same lock for its whole duration, so two
/// concurrent `take` calls never see the same entry. `take` never waits for
/// entries to arrive; it returns whatever is there, up to the count.
#[derive(Debug, Default)]
pub struct TransactionPool {
    entries: Mutex<VecDeque<PoolEntry>>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the tail
    pub fn add(&self, entry: PoolEntry) {
        self.entries.lock().push_back(entry);
    }

    /// Serialize a report to its pool form and append it
    pub fn add_report(&self, report: &HealthReport) -> MempoolResult<()> {
        let entry = report.to_entry()?;
        self.add(entry);
        trace!(patient_id = %report.patient_id, "Report added to pool");
        Ok(())
    }

    /// Remove and return up to `count` entries from the head
    pub fn take(&self, count: usize) -> Vec<PoolEntry> {
        let mut entries = self.entries.lock();
        let n = count.min(entries.len());
        entries.drain(..n).collect()
    }

    /// Put entries back at the head, keeping their relative order
    pub fn restore(&self, restored: Vec<PoolEntry>) {
        let mut entries = self.entries.lock();
        for entry in restored.into_iter().rev() {
            entries.push_front(entry);
        }
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl MempoolInterface for TransactionPool {
    fn take(&self, count: usize) -> Vec<PoolEntry> {
        TransactionPool::take(self, count)
    }

    fn restore(&self, entries: Vec<PoolEntry>) {
        TransactionPool::restore(self, entries)
    }

    fn size(&self) -> usize {
        TransactionPool::size(self)
    }
}
