//! # boost-core
//! Foundation types, collaborator traits, and the incentive math for Boost.
//!
//! - [`eligibility`]: per-loan eligible TVL scoring
//! - [`multiplier`]: catch-up multiplier from run history
//! - [`distribution`]: per-loan rewards and the boost APY statistic
//! - [`price`]: signed price bundles and their on-chain payload

pub mod constants;
pub mod distribution;
pub mod eligibility;
pub mod error;
pub mod multiplier;
pub mod price;
pub mod traits;
pub mod types;

pub use distribution::{distribute, incentives_per_interval, DistributionPlan};
pub use eligibility::{score, score_with_quote};
pub use multiplier::resolve_multiplier;
pub use price::{DataPoint, PriceBundle, SignedDataPackage};
