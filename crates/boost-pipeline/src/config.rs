//! Pipeline configuration.
//!
//! [`PipelineConfig`] carries every tunable of a run. Nothing is read from
//! globals; the runner builds one from its config file and hands it over.

use std::time::Duration;

use boost_core::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_RUNS_TABLE_PREFIX, DEFAULT_STATISTIC_KEY, MAX_BATCH_RETRIES,
    RETRY_BACKOFF_SECS,
};
use boost_core::types::Network;

/// Tracked asset used when none is configured.
pub const DEFAULT_TRACKED_SYMBOL: &str = "GLP";

/// Configuration for a pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Reward budget per week, in reward token units.
    pub weekly_budget: f64,
    /// Loans per batch.
    pub batch_size: usize,
    /// Failed attempts tolerated per batch before the run is abandoned.
    pub max_retries: u32,
    /// Delay between a failed batch attempt and the retry.
    pub retry_backoff: Duration,
    /// Price feed symbol of the tracked asset.
    pub tracked_symbol: String,
    /// Run history table name prefix; the network name is appended.
    pub runs_table_prefix: String,
    /// Key of the published boost APY statistic.
    pub statistic_key: String,
    /// Compute everything but skip persistence.
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weekly_budget: 0.0,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: MAX_BATCH_RETRIES,
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
            tracked_symbol: DEFAULT_TRACKED_SYMBOL.to_string(),
            runs_table_prefix: DEFAULT_RUNS_TABLE_PREFIX.to_string(),
            statistic_key: DEFAULT_STATISTIC_KEY.to_string(),
            dry_run: false,
        }
    }
}

impl PipelineConfig {
    /// Run history table for `network`.
    pub fn runs_table(&self, network: &Network) -> String {
        format!("{}-{}", self.runs_table_prefix, network)
    }

    /// Effective batch size; never zero.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_size() {
        assert_eq!(PipelineConfig::default().batch_size, 200);
    }

    #[test]
    fn default_retry_budget_and_backoff() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_backoff, Duration::from_secs(10));
    }

    #[test]
    fn default_is_not_dry_run() {
        assert!(!PipelineConfig::default().dry_run);
    }

    #[test]
    fn runs_table_appends_network() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.runs_table(&Network::new("avalanche")), "boost-runs-avalanche");
    }

    #[test]
    fn runs_table_custom_prefix() {
        let cfg = PipelineConfig { runs_table_prefix: "glp-apy".into(), ..PipelineConfig::default() };
        assert_eq!(cfg.runs_table(&Network::new("arbitrum")), "glp-apy-arbitrum");
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let cfg = PipelineConfig { batch_size: 0, ..PipelineConfig::default() };
        assert_eq!(cfg.effective_batch_size(), 1);
    }
}
