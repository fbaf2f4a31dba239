//! Per-run accumulator owned by the orchestrator.

use std::collections::HashMap;

use boost_core::types::EligibilityResult;

/// Scored loans and running totals for one invocation.
#[derive(Debug, Clone)]
pub struct RunState {
    pub now: u64,
    pub multiplier: u32,
    /// Size of the loan universe at the start of the run.
    pub total_loans: usize,
    processed: HashMap<String, EligibilityResult>,
    /// First-merge order of `processed`.
    order: Vec<String>,
    total_eligible_tvl: f64,
}

impl RunState {
    pub fn new(now: u64, multiplier: u32, total_loans: usize) -> Self {
        Self {
            now,
            multiplier,
            total_loans,
            processed: HashMap::with_capacity(total_loans),
            order: Vec::with_capacity(total_loans),
            total_eligible_tvl: 0.0,
        }
    }

    /// Fold a successful batch in, updating the total by the batch's delta.
    ///
    /// A loan id seen again replaces its earlier result and the total moves
    /// by the difference.
    pub fn merge_batch(&mut self, results: Vec<EligibilityResult>) {
        for result in results {
            let id = result.loan_id.clone();
            let added = result.eligible_tvl;
            match self.processed.insert(id.clone(), result) {
                Some(previous) => self.total_eligible_tvl += added - previous.eligible_tvl,
                None => {
                    self.order.push(id);
                    self.total_eligible_tvl += added;
                }
            }
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn total_eligible_tvl(&self) -> f64 {
        self.total_eligible_tvl
    }

    /// Every loan in the universe was scored exactly once.
    pub fn is_fully_covered(&self) -> bool {
        self.processed.len() == self.total_loans
    }

    /// Scored loans in first-merge order.
    pub fn results(&self) -> impl Iterator<Item = &EligibilityResult> {
        self.order.iter().filter_map(|id| self.processed.get(id))
    }
}
