//! Retry and rate limit policy for the search endpoint.
//!
//! - 2xx: success, followed by a fixed pause to stay under the rate limit
//! - 429, 5xx and other unexpected statuses: transient, retried after a
//!   random pause within `[min_backoff, max_backoff]`
//! - any other 4xx: rejected, never retried
//!
//! Retries stop after `max_attempts` calls for the same page.

use std::time::Duration;

use rand::Rng;

use crate::models::RetryConfig;

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Rejected,
    Transient,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            429 => Self::Transient,
            400..=499 => Self::Rejected,
            _ => Self::Transient,
        }
    }
}

/// Backoff settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    min_backoff: Duration,
    max_backoff: Duration,
    max_attempts: u32,
    rate_limit_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        let min_secs = config.min_backoff_secs.min(config.max_backoff_secs);
        Self {
            min_backoff: Duration::from_secs(min_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            max_attempts: config.max_attempts.max(1),
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
        }
    }

    /// Random pause before the next attempt, whole seconds within bounds.
    pub fn next_delay(&self) -> Duration {
        let (min, max) = (self.min_backoff.as_secs(), self.max_backoff.as_secs());
        let secs = rand::thread_rng().gen_range(min..=max);
        Duration::from_secs(secs)
    }

    /// Whether another call is allowed after `attempts` calls failed.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn rate_limit_delay(&self) -> Duration {
        self.rate_limit_delay
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(204), StatusClass::Success);
        assert_eq!(StatusClass::of(400), StatusClass::Rejected);
        assert_eq!(StatusClass::of(401), StatusClass::Rejected);
        assert_eq!(StatusClass::of(429), StatusClass::Transient);
        assert_eq!(StatusClass::of(500), StatusClass::Transient);
        assert_eq!(StatusClass::of(503), StatusClass::Transient);
        assert_eq!(StatusClass::of(302), StatusClass::Transient);
    }

    #[test]
    fn test_delay_within_bounds() {
        let policy = BackoffPolicy::default();
        for _ in 0..200 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(60));
        }
    }

    #[test]
    fn test_fixed_delay_when_bounds_meet() {
        let policy = BackoffPolicy::new(&RetryConfig {
            min_backoff_secs: 7,
            max_backoff_secs: 7,
            ..RetryConfig::default()
        });
        assert_eq!(policy.next_delay(), Duration::from_secs(7));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = BackoffPolicy::new(&RetryConfig {
            max_attempts: 3,
            ..RetryConfig::default()
        });
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let policy = BackoffPolicy::new(&RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        });
        assert_eq!(policy.max_attempts(), 1);
    }
}
