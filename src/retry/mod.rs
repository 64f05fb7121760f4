//! Retry policy for chunk-level batch delete calls.
//!
//! The default policy waits a uniformly random whole number of seconds in
//! `[1, max_delay_secs]` between attempts, without exponential growth. Many
//! chunks failing together on a throttling event then spread their retries
//! over the whole window.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::error::is_retryable_error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 5;

/// Outcome of consulting a [`RetryPolicy`] after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    pub fn give_up() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Strategy deciding whether and when a failed chunk request is retried.
///
/// Implementations are shared by every chunk task of a call, so they must be
/// safe to invoke concurrently.
pub trait RetryPolicy: Send + Sync {
    fn is_retryable(&self, err: &anyhow::Error) -> bool;

    /// Total attempts allowed, including the first one.
    fn max_attempts(&self) -> u32;

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// An error here means no safe delay could be computed; the caller fails
    /// the chunk instead of retrying immediately.
    fn next_delay(&self, attempt: u32) -> Result<Duration>;

    /// Combine classification, attempt cap and delay for one failure.
    fn decide(&self, err: &anyhow::Error, attempt: u32) -> Result<RetryDecision> {
        if !self.is_retryable(err) || attempt >= self.max_attempts() {
            return Ok(RetryDecision::give_up());
        }

        Ok(RetryDecision {
            should_retry: true,
            delay: self.next_delay(attempt)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub max_delay_secs: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
        }
    }
}

/// Uniform jitter in `[1, max_delay_secs]` seconds.
///
/// Each call to `next_delay` seeds a fresh generator from the OS random
/// source, so no generator state is shared between chunk tasks.
#[derive(Debug, Clone)]
pub struct JitterRetryPolicy {
    max_attempts: u32,
    max_delay_secs: u64,
}

impl JitterRetryPolicy {
    pub fn new(max_attempts: u32, max_delay_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_delay_secs: max_delay_secs.max(1),
        }
    }

    pub fn max_delay_secs(&self) -> u64 {
        self.max_delay_secs
    }
}

impl Default for JitterRetryPolicy {
    fn default() -> Self {
        Self::from(RetryPolicyConfig::default())
    }
}

impl From<RetryPolicyConfig> for JitterRetryPolicy {
    fn from(config: RetryPolicyConfig) -> Self {
        Self::new(config.max_attempts, config.max_delay_secs)
    }
}

impl RetryPolicy for JitterRetryPolicy {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        is_retryable_error(err)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn next_delay(&self, _attempt: u32) -> Result<Duration> {
        let mut rng = StdRng::try_from_os_rng()
            .context("failed to seed retry jitter from the OS random source")?;
        let secs = rng.random_range(1..=self.max_delay_secs);
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error::DeletionError;
    use anyhow::anyhow;
    use proptest::prelude::*;

    fn throttled() -> anyhow::Error {
        anyhow!(DeletionError::Throttled("slow down".to_string()))
    }

    #[test]
    fn default_policy() {
        let policy = JitterRetryPolicy::default();
        assert_eq!(policy.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.max_delay_secs(), DEFAULT_MAX_DELAY_SECS);
    }

    #[test]
    fn zero_settings_are_clamped() {
        let policy = JitterRetryPolicy::new(0, 0);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.max_delay_secs(), 1);
        assert_eq!(policy.next_delay(1).unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn delay_reaches_both_ends_of_the_range() {
        let policy = JitterRetryPolicy::new(3, 2);
        let delays: Vec<u64> = (0..200)
            .map(|i| policy.next_delay(i).unwrap().as_secs())
            .collect();
        assert!(delays.contains(&1));
        assert!(delays.contains(&2));
    }

    proptest! {
        #[test]
        fn delay_is_within_bounds(max_delay in 1u64..120, attempt in 1u32..10) {
            let policy = JitterRetryPolicy::new(5, max_delay);
            let delay = policy.next_delay(attempt).unwrap();
            prop_assert!(delay >= Duration::from_secs(1));
            prop_assert!(delay <= Duration::from_secs(max_delay));
            prop_assert_eq!(delay.subsec_nanos(), 0);
        }
    }

    #[test]
    fn decide_retries_transient_errors_until_cap() {
        let policy = JitterRetryPolicy::new(3, 1);

        let decision = policy.decide(&throttled(), 1).unwrap();
        assert!(decision.should_retry);
        assert_eq!(decision.delay, Duration::from_secs(1));

        assert!(policy.decide(&throttled(), 2).unwrap().should_retry);
        assert_eq!(
            policy.decide(&throttled(), 3).unwrap(),
            RetryDecision::give_up()
        );
    }

    #[test]
    fn decide_never_retries_permanent_errors() {
        let policy = JitterRetryPolicy::default();
        let err = anyhow!(DeletionError::AccessDenied("denied".to_string()));
        assert!(!policy.decide(&err, 1).unwrap().should_retry);
        assert!(!policy.decide(&anyhow!("opaque failure"), 1).unwrap().should_retry);
    }

    struct BrokenRandomSource;

    impl RetryPolicy for BrokenRandomSource {
        fn is_retryable(&self, _err: &anyhow::Error) -> bool {
            true
        }

        fn max_attempts(&self) -> u32 {
            5
        }

        fn next_delay(&self, _attempt: u32) -> Result<Duration> {
            Err(anyhow!("entropy unavailable"))
        }
    }

    #[test]
    fn decide_propagates_delay_failure() {
        let result = BrokenRandomSource.decide(&throttled(), 1);
        assert!(result.is_err());
        // the cap is checked before asking for a delay
        assert!(!BrokenRandomSource.decide(&throttled(), 5).unwrap().should_retry);
    }
}
