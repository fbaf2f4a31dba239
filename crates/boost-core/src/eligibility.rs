//! Eligible TVL scoring.
//!
//! A loan earns boost on the part of its tracked-asset exposure that its own
//! collateral does not already cover:
//!
//! ```text
//! collateral     = raw_collateral - raw_debt
//! tracked_value  = tracked_asset_balance * price
//! eligible_tvl   = max(0, tracked_value - collateral)
//! ```
//!
//! A missing price quote scores the loan at zero instead of failing the batch.

use tracing::warn;

use crate::price::PriceBundle;
use crate::types::{EligibilityResult, LoanRecord, PriceQuote};

/// Score a loan against the tracked-asset price found in `bundle`.
pub fn score(loan: &LoanRecord, bundle: &PriceBundle, tracked_symbol: &str) -> EligibilityResult {
    let quote = bundle.quote(tracked_symbol);
    if quote.is_none() {
        warn!(loan = %loan.address, symbol = tracked_symbol, "price bundle has no quote; scoring at zero price");
    }
    score_with_quote(loan, quote.as_ref())
}

/// Score a loan against an already resolved quote. `None` means price zero.
pub fn score_with_quote(loan: &LoanRecord, quote: Option<&PriceQuote>) -> EligibilityResult {
    let price = quote.map(|q| q.value).unwrap_or(0.0);
    let collateral = loan.raw_collateral - loan.raw_debt;
    let tracked_value = loan.tracked_asset_balance * price;
    let excess = tracked_value - collateral;

    // NaN fails the comparison and clamps too.
    let eligible_tvl = if excess > 0.0 && excess.is_finite() { excess } else { 0.0 };

    EligibilityResult { loan_id: loan.address.to_string(), eligible_tvl }
}
