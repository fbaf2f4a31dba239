//! In-memory result store.
//!
//! Used in tests. Counts every write so callers can assert that
//! an abandoned or skipped run touched nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use boost_core::error::StoreError;
use boost_core::traits::ResultStore;
use boost_core::types::{BoostApyRecord, IncentiveLedgerEntry, RunRecord};

#[derive(Default)]
struct Inner {
    runs: HashMap<String, BTreeMap<u64, RunRecord>>,
    ledger: BTreeMap<(String, u64), IncentiveLedgerEntry>,
    statistics: HashMap<String, BoostApyRecord>,
}

/// Result store held entirely in memory.
#[derive(Default)]
pub struct MemoryResultStore {
    inner: RwLock<Inner>,
    writes: AtomicUsize,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls received so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All ledger entries for `loan_id`, oldest first.
    pub fn ledger_entries(&self, loan_id: &str) -> Vec<IncentiveLedgerEntry> {
        self.inner
            .read()
            .ledger
            .range((loan_id.to_string(), 0)..=(loan_id.to_string(), u64::MAX))
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Every ledger entry in the store.
    pub fn all_ledger_entries(&self) -> Vec<IncentiveLedgerEntry> {
        self.inner.read().ledger.values().cloned().collect()
    }

    pub fn statistic(&self, key: &str) -> Option<BoostApyRecord> {
        self.inner.read().statistics.get(key).cloned()
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl ResultStore for MemoryResultStore {
    fn query_recent_runs(&self, table: &str, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .runs
            .get(table)
            .map(|runs| runs.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn append_run(&self, table: &str, record: &RunRecord) -> Result<(), StoreError> {
        self.bump();
        self.inner
            .write()
            .runs
            .entry(table.to_string())
            .or_default()
            .insert(record.timestamp, record.clone());
        Ok(())
    }

    fn upsert_ledger_entry(&self, entry: &IncentiveLedgerEntry) -> Result<(), StoreError> {
        self.bump();
        self.inner
            .write()
            .ledger
            .insert((entry.loan_id.clone(), entry.timestamp), entry.clone());
        Ok(())
    }

    fn upsert_statistic(&self, record: &BoostApyRecord) -> Result<(), StoreError> {
        self.bump();
        self.inner.write().statistics.insert(record.key.clone(), record.clone());
        Ok(())
    }
}
