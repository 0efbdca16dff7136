//! Retry policy and per-session retry budget.
//!
//! Pure decision logic, no I/O: the backoff math and the should-retry cutoff
//! live here so they can be property-tested without spinning up a driver.

use std::time::Duration;

/// Bounded exponential backoff policy.
///
/// Delays grow `base * 2^attempt`, saturating, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts permitted before a session is declared failed.
    pub max_attempts: u32,
    /// Delay before the first relaunch.
    pub base_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before the relaunch for `attempt` (zero-based).
    ///
    /// Non-decreasing in `attempt` up to the configured cap.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX));
        exponential.min(self.max_delay)
    }

    /// Whether another attempt is permitted after `attempt` prior failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Per-session attempt counter, owned by the session agent.
///
/// Reset to zero only on a transition into Healthy.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryBudget {
    attempts: u32,
}

impl RetryBudget {
    /// Fresh budget with zero attempts consumed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts consumed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one failed attempt and return the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Reset the counter. Called when the session reaches Healthy.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Whether the policy permits another attempt.
    #[must_use]
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        policy.should_retry(self.attempts)
    }
}
