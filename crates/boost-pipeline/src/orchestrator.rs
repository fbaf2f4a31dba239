//! Batch orchestrator.
//!
//! One [`Pipeline::run`] walks the loan universe in contiguous batches, each
//! scored against a freshly fetched price bundle. A batch that fails is
//! retried on the next endpoint after a backoff; once the retry budget is
//! spent the whole run is abandoned. Results reach the store only when every
//! loan of the universe was scored, and then in a single commit.
//!
//! ```text
//! FetchingUniverse -> BatchLoop(i) <-> Retrying(i, n) -> Aggregated -> FullyCovered
//!        |                                  |                 |
//!        +------------- abandoned ----------+-----------------+-> PartiallyCovered
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, info, trace, warn};

use boost_core::error::BoostError;
use boost_core::traits::{ChainReader, NoopNotifier, PriceFeed, ResultStore, RunNotifier};
use boost_core::types::{
    AbandonReason, BoostApyRecord, EligibilityResult, LoanAddress, Network, RpcEndpoint, RunCommit,
    RunOutcome, RunRecord, RunSummary,
};
use boost_core::{distribute, resolve_multiplier, score};

use crate::config::PipelineConfig;
use crate::endpoints::{EndpointPreference, EndpointRotation};
use crate::state::RunState;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq)]
enum RunPhase {
    FetchingUniverse,
    BatchLoop { batch: usize, attempt: u32 },
    Retrying { batch: usize, attempt: u32, error: String },
    Aggregated,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchingUniverse => f.write_str("fetching-universe"),
            Self::BatchLoop { batch, .. } => write!(f, "batch-loop({batch})"),
            Self::Retrying { batch, attempt, .. } => write!(f, "retrying({batch}, {attempt})"),
            Self::Aggregated => f.write_str("aggregated"),
        }
    }
}

/// The pipeline and its collaborators.
pub struct Pipeline {
    config: PipelineConfig,
    chain: Arc<dyn ChainReader>,
    prices: Arc<dyn PriceFeed>,
    store: Arc<dyn ResultStore>,
    notifier: Arc<dyn RunNotifier>,
    endpoints: HashMap<Network, Vec<RpcEndpoint>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceFeed>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            config,
            chain,
            prices,
            store,
            notifier: Arc::new(NoopNotifier),
            endpoints: HashMap::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RunNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Register `network` with its RPC endpoints in failover order.
    pub fn with_network(mut self, network: Network, endpoints: Vec<RpcEndpoint>) -> Self {
        self.endpoints.insert(network, endpoints);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registered networks, sorted by name.
    pub fn networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = self.endpoints.keys().cloned().collect();
        networks.sort();
        networks
    }

    /// Run once for `network` at the current wall-clock time.
    pub async fn run(
        &self,
        network: &Network,
        preference: EndpointPreference,
    ) -> Result<RunOutcome, BoostError> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        self.run_at(now, network, preference).await
    }

    /// Run once for `network` as of `now` (Unix seconds).
    ///
    /// Abandoned and skipped runs are `Ok`. Only store and distribution
    /// failures surface as errors. The notifier hears about every run,
    /// errors included.
    pub async fn run_at(
        &self,
        now: u64,
        network: &Network,
        preference: EndpointPreference,
    ) -> Result<RunOutcome, BoostError> {
        let result = self.execute(now, network, preference).await;
        match &result {
            Ok(outcome) => self.notify(outcome).await,
            Err(e) => {
                error!(%network, now, error = %e, "run failed");
                let failed = RunOutcome::Failed { network: network.clone(), timestamp: now, error: e.to_string() };
                self.notify(&failed).await;
            }
        }
        result
    }

    async fn execute(
        &self,
        now: u64,
        network: &Network,
        preference: EndpointPreference,
    ) -> Result<RunOutcome, BoostError> {
        let table = self.config.runs_table(network);
        let recent = self.store.query_recent_runs(&table, 1)?;
        let multiplier = resolve_multiplier(now, &recent);

        if multiplier == 0 {
            info!(%network, now, "current interval already paid; skipping run");
            return Ok(RunOutcome::Skipped { network: network.clone(), timestamp: now });
        }
        info!(%network, now, multiplier, "starting run");

        let outcome = match self.collect(now, multiplier, network, preference).await {
            Ok(state) => RunOutcome::Completed(self.finish(&table, network, state)?),
            Err(reason) => {
                warn!(%network, now, %reason, "run abandoned; nothing persisted");
                RunOutcome::Abandoned { network: network.clone(), timestamp: now, reason }
            }
        };
        Ok(outcome)
    }

    /// Drive the phase machine until the universe is fully scored or the run
    /// is abandoned.
    async fn collect(
        &self,
        now: u64,
        multiplier: u32,
        network: &Network,
        preference: EndpointPreference,
    ) -> Result<RunState, AbandonReason> {
        let endpoints = self.endpoints.get(network).cloned().unwrap_or_default();
        let mut rotation = EndpointRotation::new(network, endpoints, preference)
            .map_err(|e| AbandonReason::UniverseUnavailable { error: e.to_string() })?;

        let batch_size = self.config.effective_batch_size();
        let mut loans: Vec<LoanAddress> = Vec::new();
        let mut state = RunState::new(now, multiplier, 0);
        let mut phase = RunPhase::FetchingUniverse;

        loop {
            trace!(%network, %phase, "phase");
            phase = match phase {
                RunPhase::FetchingUniverse => {
                    let endpoint = rotation.active();
                    match self.chain.list_all_loans(network, endpoint).await {
                        Ok(found) => {
                            info!(%network, %endpoint, loans = found.len(), "fetched loan universe");
                            state = RunState::new(now, multiplier, found.len());
                            loans = found;
                            RunPhase::BatchLoop { batch: 0, attempt: 0 }
                        }
                        Err(e) => return Err(AbandonReason::UniverseUnavailable { error: e.to_string() }),
                    }
                }

                RunPhase::BatchLoop { batch, attempt } => {
                    let start = batch.saturating_mul(batch_size);
                    if start >= loans.len() {
                        RunPhase::Aggregated
                    } else {
                        let end = start.saturating_add(batch_size).min(loans.len());
                        let endpoint = rotation.active();
                        match self.process_batch(network, endpoint, &loans[start..end]).await {
                            Ok(results) => {
                                debug!(%network, batch, loans = results.len(), "batch scored");
                                state.merge_batch(results);
                                RunPhase::BatchLoop { batch: batch + 1, attempt: 0 }
                            }
                            Err(e) => RunPhase::Retrying { batch, attempt: attempt + 1, error: e.to_string() },
                        }
                    }
                }

                RunPhase::Retrying { batch, attempt, error } => {
                    if attempt > self.config.max_retries {
                        return Err(AbandonReason::RetriesExhausted { batch, attempts: attempt, last_error: error });
                    }
                    let endpoint = rotation.rotate();
                    warn!(
                        %network, batch, attempt, %endpoint, %error,
                        backoff_secs = self.config.retry_backoff.as_secs(),
                        "batch failed; retrying on next endpoint"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                    RunPhase::BatchLoop { batch, attempt }
                }

                RunPhase::Aggregated => {
                    if state.is_fully_covered() {
                        return Ok(state);
                    }
                    return Err(AbandonReason::Incomplete {
                        processed: state.processed_count(),
                        expected: state.total_loans,
                    });
                }
            };
        }
    }

    /// Fetch a fresh bundle, then read and score every loan concurrently.
    async fn process_batch(
        &self,
        network: &Network,
        endpoint: &RpcEndpoint,
        loans: &[LoanAddress],
    ) -> Result<Vec<EligibilityResult>, BoostError> {
        let bundle = self.prices.fetch(network).await?;
        let bundle = &bundle;
        let symbol = self.config.tracked_symbol.as_str();

        stream::iter(loans.iter().map(|address| async move {
            let loan = self.chain.read_loan_status(network, endpoint, address, bundle).await?;
            Ok::<_, BoostError>(score(&loan, bundle, symbol))
        }))
        .buffered(loans.len().max(1))
        .try_collect()
        .await
    }

    /// Distribute and persist a fully covered run.
    fn finish(&self, table: &str, network: &Network, state: RunState) -> Result<RunSummary, BoostError> {
        let total_eligible_tvl = state.total_eligible_tvl();
        let plan = distribute(
            state.results(),
            total_eligible_tvl,
            self.config.weekly_budget,
            state.multiplier,
            state.now,
        )?;
        let incentives_distributed = plan.total_rewards();

        let commit = RunCommit {
            table: table.to_string(),
            run: RunRecord {
                timestamp: state.now,
                multiplier: state.multiplier,
                total_loans: state.total_loans as u64,
                total_eligible_tvl,
                incentives_distributed,
            },
            entries: plan.rewards,
            statistic: BoostApyRecord { key: self.config.statistic_key.clone(), boost_apy: plan.boost_apy },
        };

        let persisted = !self.config.dry_run;
        if persisted {
            self.store.commit_run(&commit)?;
        }

        info!(
            %network,
            now = state.now,
            multiplier = state.multiplier,
            loans = state.total_loans,
            total_eligible_tvl,
            incentives_distributed,
            boost_apy = ?plan.boost_apy,
            persisted,
            "run completed"
        );

        Ok(RunSummary {
            network: network.clone(),
            timestamp: state.now,
            multiplier: state.multiplier,
            total_loans: state.total_loans,
            total_eligible_tvl,
            incentives_distributed,
            boost_apy: plan.boost_apy,
            persisted,
        })
    }

    async fn notify(&self, outcome: &RunOutcome) {
        if let Err(e) = self.notifier.notify(outcome).await {
            warn!(network = %outcome.network(), error = %e, "run notifier failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use boost_core::error::{ChainError, PriceError, StoreError};
    use boost_core::price::{DataPoint, PriceBundle, SignedDataPackage, SIGNATURE_LEN};
    use boost_core::types::{IncentiveLedgerEntry, LoanRecord};
    use boost_store::MemoryResultStore;
    use parking_lot::Mutex;

    const NOW: u64 = 1_700_000_000;
    const BAD: &str = "http://bad-rpc";
    const GOOD: &str = "http://good-rpc";

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    /// Serves fixed loans; every call through [`BAD`] fails.
    struct FakeChain {
        loans: Vec<LoanRecord>,
        list_fails: bool,
        list_calls: AtomicU32,
        read_endpoints: Mutex<Vec<String>>,
    }

    impl FakeChain {
        fn new(loans: Vec<LoanRecord>) -> Self {
            Self { loans, list_fails: false, list_calls: AtomicU32::new(0), read_endpoints: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn list_all_loans(&self, _: &Network, _: &RpcEndpoint) -> Result<Vec<LoanAddress>, ChainError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.list_fails {
                return Err(ChainError::Transport("registry unreachable".into()));
            }
            Ok(self.loans.iter().map(|l| l.address.clone()).collect())
        }

        async fn read_loan_status(
            &self,
            _: &Network,
            endpoint: &RpcEndpoint,
            address: &LoanAddress,
            _: &PriceBundle,
        ) -> Result<LoanRecord, ChainError> {
            self.read_endpoints.lock().push(endpoint.url.clone());
            if endpoint.url == BAD {
                return Err(ChainError::Transport("connection reset".into()));
            }
            self.loans
                .iter()
                .find(|l| &l.address == address)
                .cloned()
                .ok_or_else(|| ChainError::Reverted { contract: address.to_string(), reason: "no loan".into() })
        }
    }

    /// Fails the first `fail_first` fetches, then serves a GLP price.
    struct FakePrices {
        price: f64,
        fail_first: u32,
        fetches: AtomicU32,
    }

    impl FakePrices {
        fn new(price: f64) -> Self {
            Self { price, fail_first: 0, fetches: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl PriceFeed for FakePrices {
        async fn fetch(&self, _: &Network) -> Result<PriceBundle, PriceError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(PriceError::Gateway("503".into()));
            }
            Ok(PriceBundle::new(vec![SignedDataPackage {
                timestamp_milliseconds: NOW * 1000,
                data_points: vec![DataPoint { data_feed_id: "GLP".into(), value: self.price }],
                signature: vec![0; SIGNATURE_LEN],
                signer_address: None,
            }]))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        outcomes: Mutex<Vec<RunOutcome>>,
    }

    #[async_trait]
    impl RunNotifier for RecordingNotifier {
        async fn notify(&self, outcome: &RunOutcome) -> Result<(), BoostError> {
            self.outcomes.lock().push(outcome.clone());
            Err(BoostError::Notifier("webhook down".into()))
        }
    }

    mockall::mock! {
        Store {}
        impl ResultStore for Store {
            fn query_recent_runs(&self, table: &str, limit: usize) -> Result<Vec<RunRecord>, StoreError>;
            fn append_run(&self, table: &str, record: &RunRecord) -> Result<(), StoreError>;
            fn upsert_ledger_entry(&self, entry: &IncentiveLedgerEntry) -> Result<(), StoreError>;
            fn upsert_statistic(&self, record: &BoostApyRecord) -> Result<(), StoreError>;
            fn commit_run(&self, commit: &RunCommit) -> Result<(), StoreError>;
        }
    }

    /// A store that answers history queries with `history` and must never be written.
    fn read_only_store(history: Vec<RunRecord>) -> MockStore {
        let mut store = MockStore::new();
        store.expect_query_recent_runs().returning(move |_, _| Ok(history.clone()));
        store.expect_append_run().never();
        store.expect_upsert_ledger_entry().never();
        store.expect_upsert_statistic().never();
        store.expect_commit_run().never();
        store
    }

    fn loan(last: u8, collateral: f64, debt: f64, balance: f64) -> LoanRecord {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        LoanRecord {
            address: LoanAddress::from_bytes(bytes),
            raw_collateral: collateral,
            raw_debt: debt,
            tracked_asset_balance: balance,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig { weekly_budget: 125.0, ..PipelineConfig::default() }
    }

    fn net() -> Network {
        Network::new("avalanche")
    }

    fn pipeline(
        config: PipelineConfig,
        chain: Arc<FakeChain>,
        prices: Arc<FakePrices>,
        store: Arc<dyn ResultStore>,
        endpoints: &[&str],
    ) -> Pipeline {
        Pipeline::new(config, chain, prices, store)
            .with_network(net(), endpoints.iter().map(|u| RpcEndpoint::new(*u)).collect())
    }

    fn prior_run(timestamp: u64) -> RunRecord {
        RunRecord { timestamp, multiplier: 1, total_loans: 0, total_eligible_tvl: 0.0, incentives_distributed: 0.0 }
    }

    // ------------------------------------------------------------------
    // Skip
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn same_hour_rerun_is_skipped_without_reads_or_writes() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![prior_run(NOW)]));
        let p = pipeline(config(), chain.clone(), prices.clone(), store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();

        assert_eq!(outcome, RunOutcome::Skipped { network: net(), timestamp: NOW });
        assert_eq!(chain.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 0);
    }

    // ------------------------------------------------------------------
    // Completed runs
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn first_run_scores_distributes_and_persists() {
        // Eligible TVL 70 and 30.
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0), loan(2, 10.0, 0.0, 40.0 / 3.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(MemoryResultStore::new());
        let p = pipeline(config(), chain.clone(), prices, store.clone(), &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        let RunOutcome::Completed(summary) = outcome else { panic!("expected completion") };

        assert_eq!(summary.multiplier, 1);
        assert_eq!(summary.total_loans, 2);
        assert!((summary.total_eligible_tvl - 100.0).abs() < 1e-9);
        assert!((summary.incentives_distributed - 0.744_047_619).abs() < 1e-6);
        assert!(summary.persisted);

        let first = store.ledger_entries(&chain.loans[0].address.to_string());
        assert_eq!(first.len(), 1);
        assert!((first[0].reward_amount - 0.520_833_333).abs() < 1e-6);
        let second = store.ledger_entries(&chain.loans[1].address.to_string());
        assert!((second[0].reward_amount - 0.223_214_285).abs() < 1e-6);

        let runs = store.query_recent_runs("boost-runs-avalanche", 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].timestamp, NOW);
        assert!(store.statistic("boost-apy").is_some());
    }

    #[tokio::test]
    async fn catch_up_run_scales_budget_by_elapsed_hours() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(MemoryResultStore::new());
        store.append_run("boost-runs-avalanche", &prior_run(NOW - 3 * 3600)).unwrap();
        let p = pipeline(config(), chain, prices, store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        let RunOutcome::Completed(summary) = outcome else { panic!("expected completion") };
        assert_eq!(summary.multiplier, 3);
        assert!((summary.incentives_distributed - 3.0 * 125.0 / 168.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_universe_completes_with_zero_apy() {
        let chain = Arc::new(FakeChain::new(vec![]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(MemoryResultStore::new());
        let p = pipeline(config(), chain, prices.clone(), store.clone(), &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        let RunOutcome::Completed(summary) = outcome else { panic!("expected completion") };
        assert_eq!(summary.total_loans, 0);
        assert_eq!(summary.boost_apy, Some(0.0));
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(store.query_recent_runs("boost-runs-avalanche", 1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_computes_but_does_not_write() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![]));
        let cfg = PipelineConfig { dry_run: true, ..config() };
        let p = pipeline(cfg, chain, prices, store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        let RunOutcome::Completed(summary) = outcome else { panic!("expected completion") };
        assert!(!summary.persisted);
        assert!((summary.total_eligible_tvl - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn loans_are_split_into_batches_with_fresh_bundles() {
        let loans: Vec<LoanRecord> = (1..=5).map(|i| loan(i, 0.0, 0.0, 1.0)).collect();
        let chain = Arc::new(FakeChain::new(loans));
        let prices = Arc::new(FakePrices::new(1.0));
        let store = Arc::new(MemoryResultStore::new());
        let cfg = PipelineConfig { batch_size: 2, ..config() };
        let p = pipeline(cfg, chain, prices.clone(), store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(ref s) if s.total_loans == 5));
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 3);
    }

    // ------------------------------------------------------------------
    // Retry and failover
    // ------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn failed_batch_fails_over_and_waits_backoff() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(MemoryResultStore::new());
        let p = pipeline(config(), chain.clone(), prices.clone(), store, &[BAD, GOOD]);

        let started = tokio::time::Instant::now();
        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(*chain.read_endpoints.lock(), vec![BAD.to_string(), GOOD.to_string()]);
        // One bundle per attempt.
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn price_feed_outage_is_retried() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices { fail_first: 3, ..FakePrices::new(3.0) });
        let store = Arc::new(MemoryResultStore::new());
        let p = pipeline(config(), chain, prices.clone(), store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_abandon_with_zero_writes() {
        let chain = Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![]));
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(config(), chain, prices.clone(), store, &[BAD]).with_notifier(notifier.clone());

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();

        let RunOutcome::Abandoned { reason, .. } = &outcome else { panic!("expected abandonment") };
        assert!(matches!(reason, AbandonReason::RetriesExhausted { batch: 0, attempts: 4, .. }));
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 4);
        // The failing notifier is logged, not propagated.
        assert_eq!(*notifier.outcomes.lock(), vec![outcome]);
    }

    #[tokio::test]
    async fn universe_failure_abandons_run() {
        let mut chain = FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)]);
        chain.list_fails = true;
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![]));
        let p = pipeline(config(), Arc::new(chain), prices.clone(), store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Abandoned { reason: AbandonReason::UniverseUnavailable { .. }, .. }
        ));
        assert_eq!(prices.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_network_abandons_run() {
        let chain = Arc::new(FakeChain::new(vec![]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![]));
        let p = pipeline(config(), chain, prices, store, &[GOOD]);

        let outcome = p.run_at(NOW, &Network::new("fantom"), EndpointPreference::Primary).await.unwrap();
        assert!(outcome.is_abandoned());
    }

    #[tokio::test]
    async fn duplicate_loans_in_universe_fail_coverage() {
        let dup = loan(1, 100.0, 20.0, 50.0);
        let chain = Arc::new(FakeChain::new(vec![dup.clone(), dup]));
        let prices = Arc::new(FakePrices::new(3.0));
        let store = Arc::new(read_only_store(vec![]));
        let p = pipeline(config(), chain, prices, store, &[GOOD]);

        let outcome = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Abandoned { reason: AbandonReason::Incomplete { processed: 1, expected: 2 }, .. }
        ));
    }

    // ------------------------------------------------------------------
    // Store failures
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn history_read_failure_is_an_error() {
        let mut store = MockStore::new();
        store.expect_query_recent_runs().returning(|_, _| Err(StoreError::Backend("io".into())));
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            config(),
            Arc::new(FakeChain::new(vec![])),
            Arc::new(FakePrices::new(1.0)),
            Arc::new(store),
            &[GOOD],
        )
        .with_notifier(notifier.clone());
        let err = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap_err();
        assert!(matches!(err, BoostError::Store(_)));

        let outcomes = notifier.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], RunOutcome::Failed { timestamp: NOW, .. }));
    }

    #[tokio::test]
    async fn commit_failure_is_an_error() {
        let mut store = MockStore::new();
        store.expect_query_recent_runs().returning(|_, _| Ok(vec![]));
        store.expect_commit_run().times(1).returning(|_| Err(StoreError::Backend("disk full".into())));
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            config(),
            Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)])),
            Arc::new(FakePrices::new(3.0)),
            Arc::new(store),
            &[GOOD],
        )
        .with_notifier(notifier.clone());
        let err = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap_err();
        assert_eq!(err.to_string(), "storage backend: disk full");

        assert_eq!(
            *notifier.outcomes.lock(),
            vec![RunOutcome::Failed {
                network: net(),
                timestamp: NOW,
                error: "storage backend: disk full".into(),
            }]
        );
    }

    #[tokio::test]
    async fn distribution_failure_is_reported_to_notifier() {
        let notifier = Arc::new(RecordingNotifier::default());
        let cfg = PipelineConfig { weekly_budget: -1.0, ..config() };
        let p = pipeline(
            cfg,
            Arc::new(FakeChain::new(vec![loan(1, 100.0, 20.0, 50.0)])),
            Arc::new(FakePrices::new(3.0)),
            Arc::new(read_only_store(vec![])),
            &[GOOD],
        )
        .with_notifier(notifier.clone());
        let err = p.run_at(NOW, &net(), EndpointPreference::Primary).await.unwrap_err();
        assert!(matches!(err, BoostError::Distribution(_)));
        assert!(notifier.outcomes.lock()[0].is_failure());
    }

    #[test]
    fn networks_are_sorted() {
        let p = Pipeline::new(
            config(),
            Arc::new(FakeChain::new(vec![])),
            Arc::new(FakePrices::new(1.0)),
            Arc::new(MemoryResultStore::new()),
        )
        .with_network(Network::new("avalanche"), vec![])
        .with_network(Network::new("arbitrum"), vec![]);
        assert_eq!(p.networks(), vec![Network::new("arbitrum"), Network::new("avalanche")]);
    }
}
