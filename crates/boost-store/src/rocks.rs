//! RocksDB-backed result store.
//!
//! Column families:
//! - `runs`: `table ‖ 0x00 ‖ timestamp(BE)` → [`RunRecord`]
//! - `ledger`: `loan_id ‖ 0x00 ‖ timestamp(BE)` → [`IncentiveLedgerEntry`]
//! - `statistics`: `key` → [`BoostApyRecord`]
//!
//! Big-endian timestamps make byte order match time order, so a reverse scan
//! over a table prefix yields the most recent run first.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::debug;

use boost_core::error::StoreError;
use boost_core::traits::ResultStore;
use boost_core::types::{BoostApyRecord, IncentiveLedgerEntry, RunCommit, RunRecord};

// --- Column family names ---

const CF_RUNS: &str = "runs";
const CF_LEDGER: &str = "ledger";
const CF_STATISTICS: &str = "statistics";

const ALL_CFS: &[&str] = &[CF_RUNS, CF_LEDGER, CF_STATISTICS];

/// Separates the textual part of a key from its timestamp suffix.
const KEY_SEPARATOR: u8 = 0x00;

/// Durable result store.
pub struct RocksResultStore {
    db: DB,
}

impl RocksResultStore {
    /// Open or create a database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(path = %path.as_ref().display(), "opened result store");
        Ok(Self { db })
    }

    /// All ledger entries for `loan_id`, oldest first.
    pub fn ledger_entries(&self, loan_id: &str) -> Result<Vec<IncentiveLedgerEntry>, StoreError> {
        let cf = self.cf_handle(CF_LEDGER)?;
        let prefix = prefix_key(loan_id);

        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Current value of a statistic, if ever written.
    pub fn statistic(&self, key: &str) -> Result<Option<BoostApyRecord>, StoreError> {
        let cf = self.cf_handle(CF_STATISTICS)?;
        match self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(|e| StoreError::Backend(e.to_string()))
    }

    // --- Internal helpers ---

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family: {name}")))
    }

    fn put_run(&self, batch: &mut WriteBatch, table: &str, record: &RunRecord) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_RUNS)?;
        batch.put_cf(cf, timestamped_key(table, record.timestamp), encode(record)?);
        Ok(())
    }

    fn put_entry(&self, batch: &mut WriteBatch, entry: &IncentiveLedgerEntry) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_LEDGER)?;
        batch.put_cf(cf, timestamped_key(&entry.loan_id, entry.timestamp), encode(entry)?);
        Ok(())
    }

    fn put_statistic(&self, batch: &mut WriteBatch, record: &BoostApyRecord) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_STATISTICS)?;
        batch.put_cf(cf, record.key.as_bytes(), encode(record)?);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.db.write(batch).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl ResultStore for RocksResultStore {
    fn query_recent_runs(&self, table: &str, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let cf = self.cf_handle(CF_RUNS)?;
        let prefix = prefix_key(table);
        let upper = timestamped_key(table, u64::MAX);

        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse)) {
            if out.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != prefix.len() + 8 {
                return Err(StoreError::CorruptKey { table: table.to_string() });
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn append_run(&self, table: &str, record: &RunRecord) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.put_run(&mut batch, table, record)?;
        self.write(batch)
    }

    fn upsert_ledger_entry(&self, entry: &IncentiveLedgerEntry) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.put_entry(&mut batch, entry)?;
        self.write(batch)
    }

    fn upsert_statistic(&self, record: &BoostApyRecord) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.put_statistic(&mut batch, record)?;
        self.write(batch)
    }

    fn commit_run(&self, commit: &RunCommit) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.put_statistic(&mut batch, &commit.statistic)?;
        for entry in &commit.entries {
            self.put_entry(&mut batch, entry)?;
        }
        self.put_run(&mut batch, &commit.table, &commit.run)?;
        self.write(batch)?;

        debug!(
            table = %commit.table,
            timestamp = commit.run.timestamp,
            entries = commit.entries.len(),
            "committed run"
        );
        Ok(())
    }
}

/// `name ‖ 0x00`
fn prefix_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1);
    key.extend_from_slice(name.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

/// `name ‖ 0x00 ‖ timestamp(BE)`
fn timestamped_key(name: &str, timestamp: u64) -> Vec<u8> {
    let mut key = prefix_key(name);
    key.extend_from_slice(&timestamp.to_be_bytes());
    key
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, StoreError> {
    let (value, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(value)
}
