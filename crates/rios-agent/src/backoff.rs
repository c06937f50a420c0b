//! Poll delay after consecutive transport failures

use std::time::Duration;

/// Exponential backoff starting at the poll interval.
///
/// The delay doubles with every consecutive failure up to `max` and drops
/// back to the poll interval on the first success. When disabled the delay
/// is always the poll interval.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    enabled: bool,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, enabled: bool) -> Self {
        Self {
            base,
            max: max.max(base),
            enabled,
            failures: 0,
        }
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last success
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next poll
    pub fn delay(&self) -> Duration {
        if !self.enabled || self.failures == 0 {
            return self.base;
        }
        let factor = 2u32.saturating_pow(self.failures.min(31));
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60), true);
        assert_eq!(backoff.delay(), Duration::from_secs(10));

        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(20));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(40));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(60));

        for _ in 0..100 {
            backoff.record_failure();
        }
        assert_eq!(backoff.delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(300), true);
        backoff.record_failure();
        backoff.record_failure();
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_disabled_keeps_fixed_period() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(300), false);
        backoff.record_failure();
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_cap_below_base_is_raised() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1), true);
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(10));
    }
}
