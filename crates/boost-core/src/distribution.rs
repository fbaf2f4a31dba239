//! Reward distribution for one fully covered run.
//!
//! The weekly budget is converted to an hourly rate and scaled by the
//! catch-up multiplier. Each loan receives its pro-rata share by eligible TVL.
//! The published boost APY annualizes a single hour so catch-up runs do not
//! inflate it.

use crate::constants::{HOURS_PER_YEAR, SECONDS_PER_HOUR, SECONDS_PER_WEEK};
use crate::error::DistributionError;
use crate::types::{EligibilityResult, IncentiveLedgerEntry};

/// Rewards and statistic computed for a run.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionPlan {
    /// Budget paid out this run, already scaled by the multiplier.
    pub incentives_per_interval: f64,
    /// One entry per scored loan, in input order.
    pub rewards: Vec<IncentiveLedgerEntry>,
    /// `None` when the rate is not a finite number.
    pub boost_apy: Option<f64>,
}

impl DistributionPlan {
    /// Sum of all per-loan rewards.
    pub fn total_rewards(&self) -> f64 {
        self.rewards.iter().map(|r| r.reward_amount).sum()
    }
}

/// Hourly share of `weekly_budget`, times `multiplier` hours.
pub fn incentives_per_interval(weekly_budget: f64, multiplier: u32) -> f64 {
    weekly_budget / SECONDS_PER_WEEK as f64 * SECONDS_PER_HOUR as f64 * multiplier as f64
}

/// Split the interval budget across `results` in proportion to eligible TVL.
///
/// `total_eligible_tvl` is the incrementally maintained run total; it is not
/// recomputed here.
pub fn distribute<'a, I>(
    results: I,
    total_eligible_tvl: f64,
    weekly_budget: f64,
    multiplier: u32,
    timestamp: u64,
) -> Result<DistributionPlan, DistributionError>
where
    I: IntoIterator<Item = &'a EligibilityResult>,
{
    if multiplier == 0 {
        return Err(DistributionError::ZeroMultiplier);
    }
    if !weekly_budget.is_finite() || weekly_budget < 0.0 {
        return Err(DistributionError::InvalidBudget(weekly_budget.to_string()));
    }

    let interval = incentives_per_interval(weekly_budget, multiplier);

    let rewards = results
        .into_iter()
        .map(|result| {
            let reward_amount = if result.eligible_tvl > 0.0 && total_eligible_tvl > 0.0 {
                interval * result.eligible_tvl / total_eligible_tvl
            } else {
                0.0
            };
            IncentiveLedgerEntry { loan_id: result.loan_id.clone(), timestamp, reward_amount }
        })
        .collect();

    let apy = if total_eligible_tvl > 0.0 {
        (interval / multiplier as f64) / total_eligible_tvl * HOURS_PER_YEAR
    } else {
        0.0
    };
    let boost_apy = apy.is_finite().then_some(apy);

    Ok(DistributionPlan { incentives_per_interval: interval, rewards, boost_apy })
}
