//! Retry policies applied by delivery workers.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

/// Decides whether and when a failed job is attempted again.
pub trait RetryPolicy: Send + Sync {
    /// Returns the delay before the next attempt after `attempts` attempts
    /// of job `job_id` have failed, or `None` to give up.
    fn next_delay(&self, job_id: &str, attempts: u32) -> Option<Duration>;

    /// Returns the maximum number of attempts.
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff: `base * 2^(attempts - 1)`, capped at `max_delay`.
///
/// Jitter is derived from the job id so a given job always waits the same
/// amount for a given attempt.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Base delay.
    pub base: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff policy.
    pub fn new() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(3600),
            max_attempts: 5,
            jitter: 0.1,
        }
    }

    /// Sets the base delay.
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Sets the maximum attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sets the jitter factor.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, job_id: &str, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }

        let exponent = attempts.saturating_sub(1).min(31);
        let delay = self.base.saturating_mul(1_u32 << exponent).min(self.max_delay);

        if self.jitter > 0.0 {
            let spread = delay.as_millis() as f64 * self.jitter * unit_fraction(job_id, attempts);
            Some(delay + Duration::from_millis(spread as u64))
        } else {
            Some(delay)
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Same delay between every attempt.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Delay between attempts.
    pub delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl FixedDelay {
    /// Creates a fixed delay policy with three attempts.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: 3,
        }
    }

    /// Sets the maximum attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, _job_id: &str, attempts: u32) -> Option<Duration> {
        (attempts < self.max_attempts).then_some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Single attempt; failures are terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _job_id: &str, _attempts: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

// Stable value in [0, 1) for a job and attempt.
fn unit_fraction(job_id: &str, attempts: u32) -> f64 {
    let mut hasher = DefaultHasher::new();
    job_id.hash(&mut hasher);
    attempts.hash(&mut hasher);
    (hasher.finish() % 10_000) as f64 / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = ExponentialBackoff::new()
            .base(Duration::from_secs(1))
            .with_max_attempts(5)
            .jitter(0.0);

        assert_eq!(policy.next_delay("job", 1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay("job", 2), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay("job", 3), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_delay("job", 4), Some(Duration::from_secs(8)));
        assert_eq!(policy.next_delay("job", 5), None);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = ExponentialBackoff::new()
            .base(Duration::from_secs(10))
            .max_delay(Duration::from_secs(30))
            .with_max_attempts(100)
            .jitter(0.0);

        assert_eq!(policy.next_delay("job", 3), Some(Duration::from_secs(30)));
        assert_eq!(policy.next_delay("job", 64), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_jitter_is_bounded_and_stable() {
        let policy = ExponentialBackoff::new()
            .base(Duration::from_secs(10))
            .jitter(0.5);

        let first = policy.next_delay("job-a", 1).unwrap();
        assert_eq!(policy.next_delay("job-a", 1), Some(first));
        assert!(first >= Duration::from_secs(10));
        assert!(first < Duration::from_secs(15));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = FixedDelay::new(Duration::from_secs(10)).with_max_attempts(3);

        assert_eq!(policy.next_delay("job", 1), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay("job", 2), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay("job", 3), None);
    }

    #[test]
    fn test_configured_attempts_are_reported() {
        let backoff = ExponentialBackoff::new().with_max_attempts(7);
        assert_eq!(backoff.max_attempts(), 7);

        let fixed = FixedDelay::new(Duration::from_secs(1)).with_max_attempts(2);
        assert_eq!(fixed.max_attempts(), 2);
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(NoRetry.next_delay("job", 1), None);
        assert_eq!(NoRetry.max_attempts(), 1);
    }
}
