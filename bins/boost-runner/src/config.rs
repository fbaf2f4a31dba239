//! Runner configuration.
//!
//! Loaded with the `config` crate from an optional TOML file, then overridden
//! by `BOOST__*` environment variables (`BOOST__PIPELINE__WEEKLY_BUDGET=250`).
//!
//! ```toml
//! interval_secs = 3600
//! notifier_url = "https://hc-ping.com/<uuid>"
//!
//! [pipeline]
//! weekly_budget = 125.0
//!
//! [networks.avalanche]
//! registry = "0x..."
//! rpc_endpoints = ["https://api.avax.network/ext/bc/C/rpc", "https://rpc.ankr.com/avalanche"]
//! price_gateways = ["https://oracle-gateway-1.a.redstone.finance"]
//! price_service_id = "redstone-avalanche-prod"
//! unique_signers = 3
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use boost_core::types::{LoanAddress, Network, RpcEndpoint};
use boost_pipeline::config::DEFAULT_TRACKED_SYMBOL;
use boost_pipeline::PipelineConfig;
use boost_rpc::{NetworkContracts, PriceSource};

const ENV_PREFIX: &str = "BOOST";

/// Top-level runner configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Root directory for the result store.
    pub data_dir: PathBuf,
    pub log_level: String,
    /// `text` or `json`.
    pub log_format: String,
    /// Seconds between scheduled runs.
    pub interval_secs: u64,
    /// Per-request timeout for RPC and gateway calls.
    pub request_timeout_secs: u64,
    /// Health-check style webhook pinged after every run.
    pub notifier_url: Option<String>,
    pub pipeline: PipelineSection,
    pub networks: BTreeMap<String, NetworkSection>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boost");

        Self {
            data_dir,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            interval_secs: 3_600,
            request_timeout_secs: 10,
            notifier_url: None,
            pipeline: PipelineSection::default(),
            networks: BTreeMap::new(),
        }
    }
}

/// `[pipeline]` table. Unset fields fall back to [`PipelineConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Required; there is no sensible default budget.
    pub weekly_budget: Option<f64>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_secs: Option<u64>,
    pub tracked_symbol: Option<String>,
    pub runs_table_prefix: Option<String>,
    pub statistic_key: Option<String>,
}

/// `[networks.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    /// Loan registry contract.
    pub registry: String,
    /// Failover order.
    pub rpc_endpoints: Vec<String>,
    pub price_gateways: Vec<String>,
    pub price_service_id: String,
    #[serde(default = "default_unique_signers")]
    pub unique_signers: usize,
    #[serde(default = "default_tracked_decimals")]
    pub tracked_asset_decimals: u32,
    /// Feeds the bundle must carry; empty keeps every feed the gateway serves.
    #[serde(default)]
    pub price_feeds: Vec<String>,
}

fn default_unique_signers() -> usize {
    1
}

fn default_tracked_decimals() -> u32 {
    18
}

impl RunnerConfig {
    /// Load from `path` (if given) layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        let cfg: Self = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document, without environment overrides.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let cfg: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be positive");
        }
        for (name, net) in &self.networks {
            if net.rpc_endpoints.is_empty() {
                bail!("network {name}: rpc_endpoints must not be empty");
            }
            if net.price_gateways.is_empty() {
                bail!("network {name}: price_gateways must not be empty");
            }
            if net.unique_signers == 0 {
                bail!("network {name}: unique_signers must be at least 1");
            }
            net.registry
                .parse::<LoanAddress>()
                .with_context(|| format!("network {name}: bad registry address"))?;
        }
        Ok(())
    }

    /// Path to the RocksDB result store.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the pipeline configuration. Fails if no weekly budget is set.
    pub fn pipeline_config(&self, dry_run: bool) -> Result<PipelineConfig> {
        let section = &self.pipeline;
        let Some(weekly_budget) = section.weekly_budget else {
            bail!("pipeline.weekly_budget is required");
        };
        if !weekly_budget.is_finite() || weekly_budget < 0.0 {
            bail!("pipeline.weekly_budget must be a non-negative number, got {weekly_budget}");
        }

        let defaults = PipelineConfig::default();
        Ok(PipelineConfig {
            weekly_budget,
            batch_size: section.batch_size.unwrap_or(defaults.batch_size),
            max_retries: section.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff: section
                .retry_backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_backoff),
            tracked_symbol: section.tracked_symbol.clone().unwrap_or(defaults.tracked_symbol),
            runs_table_prefix: section.runs_table_prefix.clone().unwrap_or(defaults.runs_table_prefix),
            statistic_key: section.statistic_key.clone().unwrap_or(defaults.statistic_key),
            dry_run,
        })
    }

    fn tracked_symbol(&self) -> &str {
        self.pipeline.tracked_symbol.as_deref().unwrap_or(DEFAULT_TRACKED_SYMBOL)
    }

    /// Contracts per network for the chain reader.
    pub fn contracts(&self) -> Result<HashMap<Network, NetworkContracts>> {
        self.networks
            .iter()
            .map(|(name, net)| {
                let registry = net
                    .registry
                    .parse::<LoanAddress>()
                    .with_context(|| format!("network {name}: bad registry address"))?;
                let contracts = NetworkContracts {
                    registry,
                    tracked_symbol: self.tracked_symbol().to_string(),
                    tracked_decimals: net.tracked_asset_decimals,
                };
                Ok((Network::new(name.as_str()), contracts))
            })
            .collect()
    }

    /// Price sources per network for the price feed.
    pub fn price_sources(&self) -> HashMap<Network, PriceSource> {
        self.networks
            .iter()
            .map(|(name, net)| {
                let source = PriceSource {
                    gateways: net.price_gateways.clone(),
                    service_id: net.price_service_id.clone(),
                    unique_signers: net.unique_signers,
                    feeds: net.price_feeds.clone(),
                };
                (Network::new(name.as_str()), source)
            })
            .collect()
    }

    /// RPC endpoints per network, in failover order.
    pub fn endpoints(&self) -> Vec<(Network, Vec<RpcEndpoint>)> {
        self.networks
            .iter()
            .map(|(name, net)| {
                let endpoints = net.rpc_endpoints.iter().map(RpcEndpoint::new).collect();
                (Network::new(name.as_str()), endpoints)
            })
            .collect()
    }
}
