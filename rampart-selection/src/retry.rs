use std::time::Duration;

use rampart_broker::ProviderError;
use rampart_config::SelectionConfig;

/// Exponential backoff policy for snapshot acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    #[must_use]
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries: retries.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.retries, config.base_delay())
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cool-down after failed attempt `attempt` (zero based): `base_delay * 2^attempt`.
    ///
    /// Returns `None` when the error is not transient or the attempt budget is spent, meaning
    /// the caller should stop retrying.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Option<Duration> {
        if !error.is_transient() || attempt >= self.retries {
            return None;
        }
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Sum of every cool-down when all attempts fail transiently.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        let transient = ProviderError::Transport(String::new());
        (0..self.retries)
            .filter_map(|attempt| self.delay_for(attempt, &transient))
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let err = ProviderError::Timeout("slow".into());
        assert_eq!(policy.delay_for(0, &err), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(1, &err), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(2, &err), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for(3, &err), None);
        assert_eq!(policy.total_backoff(), Duration::from_secs(14));
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        let policy = RetryPolicy::default();
        let err = ProviderError::Authentication("bad key".into());
        assert_eq!(policy.delay_for(0, &err), None);
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.retries(), 1);
    }

    #[test]
    fn large_attempts_saturate() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        let err = ProviderError::Transport("reset".into());
        assert!(policy.delay_for(40, &err).is_some());
    }
}
