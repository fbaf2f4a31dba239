//! Boost incentive runner.
//!
//! Opens the result store, wires the JSON-RPC chain reader and the price
//! gateway client into a pipeline, and runs every configured network once per
//! interval until Ctrl+C. With `--once` it runs a single round and exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use boost_core::types::{Network, RunOutcome};
use boost_pipeline::{EndpointPreference, Pipeline};
use boost_rpc::{HttpPriceFeed, RpcChainReader, WebhookNotifier};
use boost_store::RocksResultStore;

mod config;

use config::RunnerConfig;

/// Boost incentive runner.
#[derive(Parser, Debug)]
#[command(name = "boost-runner", version, about = "Computes and persists hourly boost incentives")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network to run (repeatable; default: every configured network)
    #[arg(long = "network")]
    networks: Vec<String>,

    /// Run one round and exit
    #[arg(long)]
    once: bool,

    /// Compute rewards without persisting them
    #[arg(long)]
    dry_run: bool,

    /// Endpoint to start each run on ("primary" or "fallback")
    #[arg(long, default_value_t = EndpointPreference::Primary)]
    endpoint_preference: EndpointPreference,

    /// Override the configured data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut cfg = match RunnerConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("boost-runner: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        cfg.log_format = format.clone();
    }
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }

    init_logging(&cfg.log_level, &cfg.log_format);
    info!("Boost runner v{}", env!("CARGO_PKG_VERSION"));

    match run(args, cfg).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every run of the last round succeeded.
async fn run(args: Args, cfg: RunnerConfig) -> Result<bool> {
    let pipeline_config = cfg.pipeline_config(args.dry_run)?;
    let networks = select_networks(&cfg, &args.networks)?;

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("failed to create data_dir {}", cfg.data_dir.display()))?;
    let store = Arc::new(RocksResultStore::open(cfg.db_path()).context("failed to open result store")?);

    let chain = Arc::new(RpcChainReader::new(cfg.contracts()?, cfg.request_timeout()));
    let prices = Arc::new(
        HttpPriceFeed::new(cfg.price_sources(), cfg.request_timeout()).context("failed to build price feed")?,
    );

    let mut pipeline = Pipeline::new(pipeline_config, chain, prices, store.clone());
    for (network, endpoints) in cfg.endpoints() {
        pipeline = pipeline.with_network(network, endpoints);
    }
    if let Some(url) = &cfg.notifier_url {
        let notifier = WebhookNotifier::new(url.as_str(), cfg.request_timeout()).context("failed to build notifier")?;
        pipeline = pipeline.with_notifier(Arc::new(notifier));
    }

    info!(
        data_dir = %cfg.data_dir.display(),
        networks = ?networks.iter().map(Network::as_str).collect::<Vec<_>>(),
        interval_secs = cfg.interval_secs,
        dry_run = args.dry_run,
        preference = %args.endpoint_preference,
        "runner configured"
    );

    if args.once {
        let ok = run_round(&pipeline, &networks, args.endpoint_preference).await;
        store.flush()?;
        return Ok(ok);
    }

    let mut ticker = tokio::time::interval(cfg.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_ok = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                last_ok = run_round(&pipeline, &networks, args.endpoint_preference).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    store.flush()?;
    info!("Boost runner shutdown complete");
    Ok(last_ok)
}

/// Networks named on the command line, or all configured ones.
fn select_networks(cfg: &RunnerConfig, requested: &[String]) -> Result<Vec<Network>> {
    if requested.is_empty() {
        if cfg.networks.is_empty() {
            anyhow::bail!("no networks configured");
        }
        return Ok(cfg.networks.keys().map(|n| Network::new(n.as_str())).collect());
    }
    requested
        .iter()
        .map(|name| {
            if cfg.networks.contains_key(name) {
                Ok(Network::new(name.as_str()))
            } else {
                anyhow::bail!("network {name} is not configured")
            }
        })
        .collect()
}

/// Run every network once, sequentially. Returns `false` if any run failed
/// or was abandoned.
async fn run_round(pipeline: &Pipeline, networks: &[Network], preference: EndpointPreference) -> bool {
    let mut ok = true;
    for network in networks {
        match pipeline.run(network, preference).await {
            Ok(RunOutcome::Completed(summary)) => info!(
                network = %summary.network,
                multiplier = summary.multiplier,
                loans = summary.total_loans,
                incentives = summary.incentives_distributed,
                "run finished"
            ),
            Ok(RunOutcome::Skipped { .. }) => info!(%network, "run skipped"),
            Ok(RunOutcome::Abandoned { reason, .. }) => {
                warn!(%network, %reason, "run abandoned");
                ok = false;
            }
            Ok(RunOutcome::Failed { error, .. }) => {
                error!(%network, %error, "run failed");
                ok = false;
            }
            Err(e) => {
                error!(%network, error = %e, "run failed");
                ok = false;
            }
        }
    }
    ok
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
