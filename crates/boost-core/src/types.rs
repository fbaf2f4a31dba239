//! Core data types: loans, eligibility, ledger entries, run history.
//!
//! Amounts are decimal token units held in `f64`. Timestamps are Unix
//! seconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// A network the protocol is deployed on (e.g. `"avalanche"`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network(pub String);

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 20-byte contract address, stored as lowercase `0x`-prefixed hex.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String")]
pub struct LoanAddress(String);

impl LoanAddress {
    /// Build from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl FromStr for LoanAddress {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ChainError::InvalidAddress(s.to_string()))?;
        if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChainError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for LoanAddress {
    type Error = ChainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LoanAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An RPC endpoint the chain reader talks to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RpcEndpoint {
    pub url: String,
}

impl RpcEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Raw on-chain status of one loan, normalized to decimal units.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LoanRecord {
    pub address: LoanAddress,
    /// Total value held by the loan.
    pub raw_collateral: f64,
    /// Outstanding debt.
    pub raw_debt: f64,
    /// Balance of the tracked asset.
    pub tracked_asset_balance: f64,
}

/// One price looked up from a bundle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PriceQuote {
    pub symbol: String,
    pub value: f64,
}

/// A loan's contribution to protocol-wide eligible TVL.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EligibilityResult {
    pub loan_id: String,
    /// Always `>= 0`.
    pub eligible_tvl: f64,
}

/// One reward payout, keyed by `(loan_id, timestamp)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct IncentiveLedgerEntry {
    pub loan_id: String,
    pub timestamp: u64,
    pub reward_amount: f64,
}

/// The single published boost APY statistic.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct BoostApyRecord {
    pub key: String,
    /// `None` when the computed rate was not a finite number.
    pub boost_apy: Option<f64>,
}

/// A row of run history. Written only for fully covered runs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct RunRecord {
    pub timestamp: u64,
    pub multiplier: u32,
    pub total_loans: u64,
    pub total_eligible_tvl: f64,
    pub incentives_distributed: f64,
}

/// Everything a fully covered run persists, handed to the store in one call.
#[derive(Clone, Debug, PartialEq)]
pub struct RunCommit {
    /// Run history table the record is appended to.
    pub table: String,
    pub run: RunRecord,
    pub entries: Vec<IncentiveLedgerEntry>,
    pub statistic: BoostApyRecord,
}

/// Why a run ended without persisting anything.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbandonReason {
    /// The loan universe could not be listed.
    UniverseUnavailable { error: String },
    /// A batch failed more times than the retry budget allows.
    RetriesExhausted { batch: usize, attempts: u32, last_error: String },
    /// All batches succeeded but coverage did not match the universe.
    Incomplete { processed: usize, expected: usize },
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniverseUnavailable { error } => write!(f, "loan universe unavailable: {error}"),
            Self::RetriesExhausted { batch, attempts, last_error } => {
                write!(f, "batch {batch} failed {attempts} times: {last_error}")
            }
            Self::Incomplete { processed, expected } => {
                write!(f, "processed {processed} of {expected} loans")
            }
        }
    }
}

/// Summary of a fully covered run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub network: Network,
    pub timestamp: u64,
    pub multiplier: u32,
    pub total_loans: usize,
    pub total_eligible_tvl: f64,
    pub incentives_distributed: f64,
    pub boost_apy: Option<f64>,
    /// `false` for dry runs.
    pub persisted: bool,
}

/// Terminal result of one pipeline invocation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Multiplier resolved to zero; nothing was read or written.
    Skipped { network: Network, timestamp: u64 },
    Completed(RunSummary),
    Abandoned { network: Network, timestamp: u64, reason: AbandonReason },
    /// A store or distribution error ended the run; it is also returned as `Err`.
    Failed { network: Network, timestamp: u64, error: String },
}

impl RunOutcome {
    pub fn network(&self) -> &Network {
        match self {
            Self::Skipped { network, .. } | Self::Abandoned { network, .. } | Self::Failed { network, .. } => {
                network
            }
            Self::Completed(summary) => &summary.network,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }

    /// Abandoned or failed: nothing from this run was persisted.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Abandoned { .. } | Self::Failed { .. })
    }
}
