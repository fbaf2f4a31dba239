//! Trait interfaces for the pipeline's collaborators.
//!
//! - [`ChainReader`]: loan universe and per-loan status reads (boost-rpc implements)
//! - [`PriceFeed`]: signed price bundle source (boost-rpc implements)
//! - [`ResultStore`]: durable run history, ledger, and statistic (boost-store implements)
//! - [`RunNotifier`]: optional run outcome notification (boost-rpc implements)

use async_trait::async_trait;

use crate::error::{BoostError, ChainError, PriceError, StoreError};
use crate::price::PriceBundle;
use crate::types::{
    BoostApyRecord, IncentiveLedgerEntry, LoanAddress, LoanRecord, Network, RpcEndpoint, RunCommit,
    RunOutcome, RunRecord,
};

/// Read access to the protocol's on-chain loans.
///
/// The endpoint is chosen by the caller on every call; implementations keep
/// no notion of an "active" provider.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Every loan address registered on `network`, in registry order.
    async fn list_all_loans(
        &self,
        network: &Network,
        endpoint: &RpcEndpoint,
    ) -> Result<Vec<LoanAddress>, ChainError>;

    /// Current status of one loan, read with `bundle` attached so the loan
    /// contract can validate the prices it depends on.
    async fn read_loan_status(
        &self,
        network: &Network,
        endpoint: &RpcEndpoint,
        address: &LoanAddress,
        bundle: &PriceBundle,
    ) -> Result<LoanRecord, ChainError>;
}

/// Source of signed price bundles.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch a fresh bundle. Never served from a cache.
    async fn fetch(&self, network: &Network) -> Result<PriceBundle, PriceError>;
}

/// Durable key-value persistence for run results.
pub trait ResultStore: Send + Sync {
    /// Up to `limit` run records from `table`, most recent first.
    fn query_recent_runs(&self, table: &str, limit: usize) -> Result<Vec<RunRecord>, StoreError>;

    /// Append a run record to `table`.
    fn append_run(&self, table: &str, record: &RunRecord) -> Result<(), StoreError>;

    /// Insert or replace the entry keyed by `(loan_id, timestamp)`.
    fn upsert_ledger_entry(&self, entry: &IncentiveLedgerEntry) -> Result<(), StoreError>;

    /// Insert or replace the statistic under `record.key`.
    fn upsert_statistic(&self, record: &BoostApyRecord) -> Result<(), StoreError>;

    /// Persist everything a fully covered run produced.
    ///
    /// Default implementation writes the statistic, then each ledger entry,
    /// then the run record last so the multiplier only advances once the
    /// rewards are in. Stores with atomic batches should override this.
    fn commit_run(&self, commit: &RunCommit) -> Result<(), StoreError> {
        self.upsert_statistic(&commit.statistic)?;
        for entry in &commit.entries {
            self.upsert_ledger_entry(entry)?;
        }
        self.append_run(&commit.table, &commit.run)
    }
}

/// Receives the outcome of every run, successful or not.
#[async_trait]
pub trait RunNotifier: Send + Sync {
    async fn notify(&self, outcome: &RunOutcome) -> Result<(), BoostError>;
}

/// Notifier that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl RunNotifier for NoopNotifier {
    async fn notify(&self, _outcome: &RunOutcome) -> Result<(), BoostError> {
        Ok(())
    }
}
