//! Cost accounting for mission steps.

use crate::delegate::RunnerMeta;

/// Accumulates spend for one mission and owns the budget-gate latch.
///
/// The threshold is a soft signal: crossing it raises a checkpoint but
/// never blocks spend by itself.
#[derive(Debug, Clone)]
pub struct CostTracker {
    per_token_rate: f64,
    threshold: f64,
    total: f64,
    budget_checkpoint_issued: bool,
}

impl CostTracker {
    /// Create a tracker with the given per-token rate and threshold
    /// fraction.
    #[must_use]
    pub fn new(per_token_rate: f64, threshold: f64) -> Self {
        Self {
            per_token_rate,
            threshold,
            total: 0.0,
            budget_checkpoint_issued: false,
        }
    }

    /// Resume accounting from persisted mission state.
    #[must_use]
    pub fn resume(per_token_rate: f64, threshold: f64, total: f64, issued: bool) -> Self {
        Self {
            per_token_rate,
            threshold,
            total,
            budget_checkpoint_issued: issued,
        }
    }

    /// Cost of one step: complexity base plus token volume.
    #[must_use]
    pub fn step_cost(&self, meta: &RunnerMeta) -> f64 {
        let tokens = meta.token_count as f64;
        meta.complexity.base_cost() + tokens * self.per_token_rate
    }

    /// Add a step cost to the running total and return the new total.
    pub fn record(&mut self, cost: f64) -> f64 {
        self.total += cost.max(0.0);
        self.total
    }

    /// Running total.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Whether the budget checkpoint has already fired.
    #[must_use]
    pub fn budget_checkpoint_issued(&self) -> bool {
        self.budget_checkpoint_issued
    }

    /// Check the soft threshold and arm the latch on first crossing.
    ///
    /// Returns `true` exactly once per mission: the first time the
    /// running total reaches `threshold × budget_limit`.
    pub fn should_raise_budget_gate(&mut self, budget_limit: f64) -> bool {
        if self.budget_checkpoint_issued {
            return false;
        }
        if self.total >= self.threshold * budget_limit {
            self.budget_checkpoint_issued = true;
            return true;
        }
        false
    }
}
