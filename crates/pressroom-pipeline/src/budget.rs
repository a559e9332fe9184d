//! Wall-clock budget tracking for runners.
//!
//! Every runner carries a [`RunBudget`] and asks it before each phase
//! or sub-step. Exhaustion is never an error: the caller pauses and the
//! scheduled step runner picks the draft back up later.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RunBudget {
    started: Instant,
    ceiling: Duration,
}

impl RunBudget {
    #[must_use]
    pub fn start(ceiling_secs: u64) -> Self {
        Self {
            started: Instant::now(),
            ceiling: Duration::from_secs(ceiling_secs),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.ceiling.saturating_sub(self.elapsed())
    }

    /// True when at least `margin_secs` remain. The margin is the
    /// worst-case cost of the next step, so a step that starts is very
    /// likely to finish inside the ceiling.
    #[must_use]
    pub fn allows(&self, margin_secs: u64) -> bool {
        self.remaining() >= Duration::from_secs(margin_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_budget_allows_work_within_margin() {
        let budget = RunBudget::start(60);
        assert!(budget.allows(20));
        assert!(budget.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn zero_ceiling_allows_nothing() {
        let budget = RunBudget::start(0);
        assert!(!budget.allows(1));
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[test]
    fn margin_larger_than_ceiling_is_denied_immediately() {
        let budget = RunBudget::start(5);
        assert!(!budget.allows(10));
    }
}
