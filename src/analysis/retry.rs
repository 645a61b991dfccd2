//! Backoff schedule for classifier calls.
//!
//! The hosted inference API answers with a "model is loading" error while it cold
//! starts a model, and that usually clears within a few seconds. Delays double from
//! `base_delay` and are capped at `max_delay`.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total calls are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_one_second_and_caps_at_ten() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|n| policy.delay_for(n).as_secs()).collect();

        assert_eq!(delays, vec![1, 2, 4, 8, 10]);
        assert_eq!(policy.total_attempts(), 6);
    }

    #[test]
    fn huge_retry_counts_stay_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn immediate_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::ZERO);
    }
}
