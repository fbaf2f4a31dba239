//! Shared collaborators and builders for scenario and property tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use boost_core::error::{BoostError, ChainError, PriceError};
use boost_core::price::{DataPoint, PriceBundle, SignedDataPackage, SIGNATURE_LEN};
use boost_core::traits::{ChainReader, PriceFeed, ResultStore, RunNotifier};
use boost_core::types::{LoanAddress, LoanRecord, Network, RpcEndpoint, RunOutcome};
use boost_pipeline::{Pipeline, PipelineConfig};

/// Symbol the scripted price feed quotes.
pub const TRACKED: &str = "GLP";

/// Primary test endpoint.
pub const PRIMARY: &str = "http://primary-rpc";

/// Fallback test endpoint.
pub const FALLBACK: &str = "http://fallback-rpc";

/// 2023-11-14T22:13:20Z
pub const T0: u64 = 1_700_000_000;

pub const HOUR: u64 = 3_600;

pub fn network() -> Network {
    Network::new("avalanche")
}

/// Address whose last byte is `seed`.
pub fn address(seed: u8) -> LoanAddress {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xb0;
    bytes[19] = seed;
    LoanAddress::from_bytes(bytes)
}

pub fn loan(seed: u8, raw_collateral: f64, raw_debt: f64, tracked_asset_balance: f64) -> LoanRecord {
    LoanRecord { address: address(seed), raw_collateral, raw_debt, tracked_asset_balance }
}

/// A loan with no collateral whose eligible TVL at price 1 is `eligible`.
pub fn loan_with_eligible(seed: u8, eligible: f64) -> LoanRecord {
    loan(seed, 0.0, 0.0, eligible)
}

/// Single-package bundle quoting `TRACKED` at `price`.
pub fn bundle(price: f64) -> PriceBundle {
    PriceBundle::new(vec![SignedDataPackage {
        timestamp_milliseconds: T0 * 1000,
        data_points: vec![DataPoint { data_feed_id: TRACKED.into(), value: price }],
        signature: vec![0x1b; SIGNATURE_LEN],
        signer_address: Some("0x0000000000000000000000000000000000000001".into()),
    }])
}

/// Pipeline config with a 125/week budget, zero backoff and the test symbol.
pub fn config() -> PipelineConfig {
    PipelineConfig {
        weekly_budget: 125.0,
        retry_backoff: Duration::ZERO,
        tracked_symbol: TRACKED.into(),
        ..PipelineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Scripted chain
// ---------------------------------------------------------------------------

/// In-memory chain with injectable failures.
///
/// - every call through an endpoint in `dead_endpoints` fails
/// - reads of a loan in `poisoned` always fail
/// - the first `flaky_reads` loan reads fail regardless of endpoint
#[derive(Default)]
pub struct ScriptedChain {
    loans: Mutex<Vec<LoanRecord>>,
    dead_endpoints: Mutex<HashSet<String>>,
    poisoned: Mutex<HashSet<LoanAddress>>,
    flaky_reads: AtomicU32,
    universe_down: Mutex<bool>,
    reads: AtomicU32,
    endpoints_used: Mutex<Vec<String>>,
}

impl ScriptedChain {
    pub fn new(loans: Vec<LoanRecord>) -> Self {
        Self { loans: Mutex::new(loans), ..Self::default() }
    }

    pub fn set_loans(&self, loans: Vec<LoanRecord>) {
        *self.loans.lock() = loans;
    }

    pub fn kill_endpoint(&self, url: &str) {
        self.dead_endpoints.lock().insert(url.to_string());
    }

    pub fn revive_all(&self) {
        self.dead_endpoints.lock().clear();
        self.poisoned.lock().clear();
        *self.universe_down.lock() = false;
    }

    pub fn poison(&self, address: LoanAddress) {
        self.poisoned.lock().insert(address);
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.flaky_reads.store(n, Ordering::SeqCst);
    }

    pub fn take_universe_down(&self) {
        *self.universe_down.lock() = true;
    }

    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Endpoint of every loan read, in call order.
    pub fn endpoints_used(&self) -> Vec<String> {
        self.endpoints_used.lock().clone()
    }

    fn check_endpoint(&self, endpoint: &RpcEndpoint) -> Result<(), ChainError> {
        if self.dead_endpoints.lock().contains(&endpoint.url) {
            return Err(ChainError::Transport(format!("{endpoint}: connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for ScriptedChain {
    async fn list_all_loans(&self, _: &Network, endpoint: &RpcEndpoint) -> Result<Vec<LoanAddress>, ChainError> {
        self.check_endpoint(endpoint)?;
        if *self.universe_down.lock() {
            return Err(ChainError::Reverted { contract: "registry".into(), reason: "paused".into() });
        }
        Ok(self.loans.lock().iter().map(|l| l.address.clone()).collect())
    }

    async fn read_loan_status(
        &self,
        _: &Network,
        endpoint: &RpcEndpoint,
        address: &LoanAddress,
        _: &PriceBundle,
    ) -> Result<LoanRecord, ChainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.endpoints_used.lock().push(endpoint.url.clone());
        self.check_endpoint(endpoint)?;

        let flaky = self
            .flaky_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if flaky || self.poisoned.lock().contains(address) {
            return Err(ChainError::Transport(format!("{address}: timeout")));
        }

        self.loans
            .lock()
            .iter()
            .find(|l| &l.address == address)
            .cloned()
            .ok_or_else(|| ChainError::Reverted { contract: address.to_string(), reason: "unknown loan".into() })
    }
}

// ---------------------------------------------------------------------------
// Scripted price feed
// ---------------------------------------------------------------------------

/// Serves [`bundle`] at a fixed price; the first `fail_first` fetches fail.
pub struct ScriptedPrices {
    price: f64,
    fail_first: AtomicU32,
    fetches: AtomicU32,
}

impl ScriptedPrices {
    pub fn new(price: f64) -> Self {
        Self { price, fail_first: AtomicU32::new(0), fetches: AtomicU32::new(0) }
    }

    pub fn failing_first(price: f64, n: u32) -> Self {
        Self { fail_first: AtomicU32::new(n), ..Self::new(price) }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for ScriptedPrices {
    async fn fetch(&self, _: &Network) -> Result<PriceBundle, PriceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PriceError::AllGatewaysFailed(2));
        }
        Ok(bundle(self.price))
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl RecordingNotifier {
    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.outcomes.lock().clone()
    }
}

#[async_trait]
impl RunNotifier for RecordingNotifier {
    async fn notify(&self, outcome: &RunOutcome) -> Result<(), BoostError> {
        self.outcomes.lock().push(outcome.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A pipeline wired to scripted collaborators over `store`.
pub struct Harness<S: ResultStore + 'static> {
    pub chain: Arc<ScriptedChain>,
    pub prices: Arc<ScriptedPrices>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<S>,
    pub pipeline: Pipeline,
}

impl<S: ResultStore + 'static> Harness<S> {
    pub fn new(config: PipelineConfig, loans: Vec<LoanRecord>, price: f64, store: Arc<S>) -> Self {
        Self::with_prices(config, loans, ScriptedPrices::new(price), store)
    }

    pub fn with_prices(config: PipelineConfig, loans: Vec<LoanRecord>, prices: ScriptedPrices, store: Arc<S>) -> Self {
        let chain = Arc::new(ScriptedChain::new(loans));
        let prices = Arc::new(prices);
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Pipeline::new(config, chain.clone(), prices.clone(), store.clone())
            .with_notifier(notifier.clone())
            .with_network(network(), vec![RpcEndpoint::new(PRIMARY), RpcEndpoint::new(FALLBACK)]);
        Self { chain, prices, notifier, store, pipeline }
    }
}

/// Ledger rewards grouped by loan id.
pub fn rewards_by_loan(entries: &[boost_core::types::IncentiveLedgerEntry]) -> HashMap<String, f64> {
    let mut out = HashMap::new();
    for entry in entries {
        *out.entry(entry.loan_id.clone()).or_insert(0.0) += entry.reward_amount;
    }
    out
}
