//! Bounded spin-polling
//!
//! The controller has no interrupt for most of its multi-step handshakes;
//! firmware waits by spinning on a status bit with a fixed iteration budget.
//! Exhausting the budget is not retried anywhere: the caller abandons the
//! transaction and the host's USB stack times out and re-issues it. The
//! budget-to-wall-clock relationship is clock-dependent and undocumented,
//! so budgets are injected configuration rather than constants.

use crate::error::{Error, Result};

/// A single bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    iterations: u32,
}

impl PollBudget {
    /// Budget of `iterations` predicate evaluations.
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Spin until `condition` returns true, up to the budget.
    pub fn wait_for<F>(&self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        for _ in 0..self.iterations {
            if condition() {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }
}

/// The three distinct wait budgets the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudgets {
    /// DMA "write 0 / poll ready" handshakes and OUT byte-count waits
    pub dma_handshake: PollBudget,
    /// EP0 phase-ready and trigger self-clear waits
    pub control_phase: PollBudget,
    /// Bulk-IN endpoint-complete wait
    pub bulk_complete: PollBudget,
}

impl Default for PollBudgets {
    /// Iteration counts observed on production silicon.
    fn default() -> Self {
        Self {
            dma_handshake: PollBudget::new(50_000),
            control_phase: PollBudget::new(50_000),
            bulk_complete: PollBudget::new(60_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn succeeds_before_budget() {
        let mut n = 0;
        let r = PollBudget::new(10).wait_for(|| {
            n += 1;
            n == 3
        });
        assert_eq!(r, Ok(()));
        assert_eq!(n, 3);
    }

    #[test]
    fn exhaustion_is_timeout() {
        let mut n = 0u32;
        let r = PollBudget::new(5).wait_for(|| {
            n += 1;
            false
        });
        assert_eq!(r, Err(Error::Timeout));
        assert_eq!(n, 5);
    }

    #[test]
    fn zero_budget_never_evaluates_success() {
        let r = PollBudget::new(0).wait_for(|| true);
        assert_eq!(r, Err(Error::Timeout));
    }
}
