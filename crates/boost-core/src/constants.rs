//! Protocol constants. Monetary amounts are decimal token units (`f64`).

/// Length of one reward interval.
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// The weekly budget is spread evenly across this many seconds.
pub const SECONDS_PER_WEEK: u64 = 7 * 24 * SECONDS_PER_HOUR;

/// Annualization factor for the boost APY statistic.
pub const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

/// Loans read per batch. Also the bound on concurrent RPC reads.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Retries allowed per batch before the whole run is abandoned.
pub const MAX_BATCH_RETRIES: u32 = 3;

/// Pause between a failed batch attempt and its retry.
pub const RETRY_BACKOFF_SECS: u64 = 10;

/// Loan contracts report values in 18-decimal fixed point.
pub const LOAN_VALUE_DECIMALS: u32 = 18;

/// Signed price packages carry values in 8-decimal fixed point.
pub const PRICE_VALUE_DECIMALS: u32 = 8;

/// Run history lives under `"{prefix}-{network}"`.
pub const DEFAULT_RUNS_TABLE_PREFIX: &str = "boost-runs";

/// Statistic key of the published boost APY.
pub const DEFAULT_STATISTIC_KEY: &str = "boost-apy";
