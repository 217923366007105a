//! Retry policies
//!
//! A policy is a pure function of the 0-indexed attempt number; the engine
//! owns the attempt counter.

use std::time::Duration;

use contracts::RetryConfig;
use rand::Rng;

/// Decides whether another round may run and how long to wait before it
pub trait RetryPolicy: Send + Sync {
    /// Whether attempt number `attempt` may run
    fn should_retry(&self, attempt: u32) -> bool;

    /// Delay after attempt number `attempt` failed
    fn delay(&self, attempt: u32) -> Duration;
}

/// Capped exponential backoff with multiplicative jitter
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction in `[0, 1]`; each delay is scaled by a factor drawn from
    /// `[1 - jitter, 1 + jitter]`
    pub jitter: f64,
}

impl ExponentialBackoff {
    /// Backoff with the default delays and the given attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay for `attempt`
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || nominal.is_zero() {
            return nominal;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        nominal.mul_f64(factor).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_counts_attempts() {
        let policy = ExponentialBackoff::new(3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = ExponentialBackoff::new(10)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1_000))
            .with_jitter(0.0);
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = ExponentialBackoff::new(5)
            .with_base_delay(Duration::from_millis(1_000))
            .with_max_delay(Duration::from_secs(60))
            .with_jitter(0.2);
        for _ in 0..100 {
            let delay = policy.delay(0);
            assert!(delay >= Duration::from_millis(800), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_200), "{delay:?}");
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max_delay() {
        let policy = ExponentialBackoff::new(5)
            .with_base_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_millis(500))
            .with_jitter(1.0);
        for _ in 0..100 {
            assert!(policy.delay(3) <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_from_config() {
        let policy = ExponentialBackoff::from_config(&RetryConfig {
            max_attempts: 2,
            base_delay_ms: 10,
            max_delay_ms: 20,
            jitter: 0.0,
        });
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay(5), Duration::from_millis(20));
    }
}
