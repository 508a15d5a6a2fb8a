//! Retry budget and exponential backoff.
//!
//! A failed item is never retried inside the same drain cycle. Instead it is
//! stamped with the earliest time it may be attempted again, or abandoned once
//! its retry budget is spent.

use std::time::Duration;

/// Attempts after which an item is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Retry policy for queued items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry budget; an item is abandoned when its retry count reaches this.
    pub max_retries: u32,
    /// Backoff seed, doubled per retry.
    pub base_delay: Duration,
    /// Upper bound on any single backoff window.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

/// What happens to an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Keep the item; do not attempt again before `next_attempt_at`.
    Retry {
        /// The incremented retry count to persist.
        retry_count: u32,
        /// Earliest next attempt (unix ms).
        next_attempt_at: u64,
    },
    /// Remove the item; the budget is spent.
    Abandon {
        /// The retry count that reached the budget.
        retry_count: u32,
    },
}

impl RetryPolicy {
    /// Create a policy with the given budget and default delays.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Policy with no backoff at all (every item is always due).
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff window for an item that has failed `retry_count` times.
    ///
    /// Formula: min(max_delay, base_delay * 2^retry_count)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide the fate of an item whose attempt at `now` (unix ms) failed.
    pub fn on_failure(&self, retry_count: u32, now: u64) -> RetryVerdict {
        let retry_count = retry_count.saturating_add(1);
        if retry_count >= self.max_retries {
            return RetryVerdict::Abandon { retry_count };
        }
        let delay_ms = self.delay_for(retry_count).as_millis() as u64;
        RetryVerdict::Retry {
            retry_count,
            next_attempt_at: now.saturating_add(delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_five() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn delay_doubles_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(20), Duration::from_secs(300));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn failure_schedules_next_attempt() {
        let policy = RetryPolicy::default();
        let verdict = policy.on_failure(0, 10_000);
        assert_eq!(
            verdict,
            RetryVerdict::Retry {
                retry_count: 1,
                next_attempt_at: 12_000,
            }
        );
    }

    #[test]
    fn abandons_exactly_at_budget() {
        let policy = RetryPolicy::new(5);

        for previous in 0..4 {
            assert!(
                matches!(policy.on_failure(previous, 0), RetryVerdict::Retry { retry_count, .. } if retry_count == previous + 1),
                "retry {} must not abandon",
                previous + 1
            );
        }
        assert_eq!(
            policy.on_failure(4, 0),
            RetryVerdict::Abandon { retry_count: 5 }
        );
    }

    #[test]
    fn immediate_policy_is_always_due() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(
            policy.on_failure(0, 500),
            RetryVerdict::Retry {
                retry_count: 1,
                next_attempt_at: 500,
            }
        );
    }

    #[test]
    fn budget_of_one_abandons_on_first_failure() {
        let policy = RetryPolicy::new(1);
        assert_eq!(
            policy.on_failure(0, 0),
            RetryVerdict::Abandon { retry_count: 1 }
        );
    }
}
