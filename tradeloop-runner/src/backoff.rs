//! Backoff after repeated order-submission failures.
//!
//! When the broker keeps refusing orders (margin, market closed, requotes),
//! the breaker trips after `threshold` consecutive failures and the driver
//! pauses for the cooldown before polling again. Any accepted order resets it.

use std::time::Duration;

/// State of the failure breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Tripped: the driver must pause before the next cycle.
    Open,
}

/// Counts consecutive order-submission failures.
#[derive(Debug, Clone)]
pub struct FailureBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    failure_threshold: u32,
    cooldown: Duration,
}

impl FailureBreaker {
    /// A threshold of zero disables the breaker.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            failure_threshold,
            cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Record an accepted order. Resets the failure counter.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a rejected order. Returns true if this failure tripped the breaker.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        if self.failure_threshold > 0 && self.consecutive_failures >= self.failure_threshold {
            self.state = BreakerState::Open;
            return true;
        }
        false
    }

    /// Close the breaker once the cooldown has been served.
    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
    }
}
