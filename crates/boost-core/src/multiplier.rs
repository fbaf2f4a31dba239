//! Catch-up multiplier resolution.
//!
//! The multiplier is the number of whole reward hours since the last
//! successful run, so one run after an outage pays out every missed hour.
//! A multiplier of zero means the current hour was already paid and the
//! pipeline must not run.

use crate::constants::SECONDS_PER_HOUR;
use crate::types::RunRecord;

/// Resolve the multiplier for a run at `now`.
///
/// `recent_runs` is ordered most-recent-first. With no history the run counts
/// as a single standard interval. A clock behind the last run resolves to 0.
pub fn resolve_multiplier(now: u64, recent_runs: &[RunRecord]) -> u32 {
    let Some(last) = recent_runs.first() else {
        return 1;
    };
    if now <= last.timestamp {
        return 0;
    }
    let hours = (now - last.timestamp) as f64 / SECONDS_PER_HOUR as f64;
    let rounded = hours.round();
    if rounded >= u32::MAX as f64 { u32::MAX } else { rounded as u32 }
}
