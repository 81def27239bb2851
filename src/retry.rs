//! Retry policy and backoff for transient failures.
//!
//! After each attempt the client asks [`RetryConfig::decide`] what to do next.
//! The decision only looks at the transport outcome (a network error or a
//! status code) and the number of retries already spent; it knows nothing
//! about the endpoint being called.

use crate::{Error, Result};
use rand::Rng;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a single attempt produced, as seen by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// No response was obtained.
    NetworkError,
    /// A response with this status code was obtained.
    Status(u16),
}

/// Custom retry logic plugged in through [`RetryOn::Custom`].
///
/// # Examples
///
/// ```
/// use controlplane_client::retry::{AttemptOutcome, RetryPredicate};
///
/// struct RetryOnConflict;
///
/// impl RetryPredicate for RetryOnConflict {
///     fn should_retry(&self, outcome: AttemptOutcome, _attempt: usize) -> bool {
///         outcome == AttemptOutcome::Status(409)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` if the outcome of `attempt` (1-indexed) is worth retrying.
    fn should_retry(&self, outcome: AttemptOutcome, attempt: usize) -> bool;
}

/// Which attempt outcomes are retryable.
#[derive(Clone)]
pub enum RetryOn {
    /// Every network-level failure.
    NetworkErrors,
    /// Responses whose status falls in any of the ranges.
    Statuses(Vec<RangeInclusive<u16>>),
    /// Caller-supplied logic.
    Custom(Arc<dyn RetryPredicate>),
    /// Retry if any of the inner policies says so.
    Any(Vec<RetryOn>),
}

impl RetryOn {
    /// Network errors plus status 0, 429 and every status from 500 up.
    pub fn transient() -> Self {
        RetryOn::Any(vec![
            RetryOn::NetworkErrors,
            RetryOn::Statuses(vec![0..=0, 429..=429, 500..=u16::MAX]),
        ])
    }

    /// Returns `true` if `outcome` of `attempt` (1-indexed) should be retried.
    pub fn should_retry(&self, outcome: AttemptOutcome, attempt: usize) -> bool {
        match self {
            RetryOn::NetworkErrors => outcome == AttemptOutcome::NetworkError,
            RetryOn::Statuses(ranges) => match outcome {
                AttemptOutcome::Status(status) => {
                    ranges.iter().any(|range| range.contains(&status))
                }
                AttemptOutcome::NetworkError => false,
            },
            RetryOn::Custom(predicate) => predicate.should_retry(outcome, attempt),
            RetryOn::Any(policies) => policies
                .iter()
                .any(|policy| policy.should_retry(outcome, attempt)),
        }
    }
}

impl Default for RetryOn {
    fn default() -> Self {
        Self::transient()
    }
}

impl fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOn::NetworkErrors => f.write_str("NetworkErrors"),
            RetryOn::Statuses(ranges) => f.debug_tuple("Statuses").field(ranges).finish(),
            RetryOn::Custom(_) => f.write_str("Custom(..)"),
            RetryOn::Any(policies) => f.debug_tuple("Any").field(policies).finish(),
        }
    }
}

/// Exponential backoff with symmetric jitter.
///
/// The delay before retry `n` (1-indexed) is `min_wait * 2^(n - 1)`, capped at
/// `max_wait`, then scaled by a random factor in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub min_wait: Duration,
    /// Upper bound of the pre-jitter delay.
    pub max_wait: Duration,
    /// Fraction of the delay to perturb by, in `[0, 1)`.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Returns the pre-jitter delay before retry `retry` (1-indexed).
    pub fn base_delay(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as u32;
        self.min_wait
            .saturating_mul(1u32 << exponent)
            .min(self.max_wait)
    }

    /// Returns the jittered delay before retry `retry` (1-indexed).
    pub fn delay(&self, retry: usize) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        // Saturate instead of panicking when the window sits near Duration::MAX
        Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + factor)).unwrap_or(Duration::MAX)
    }
}

/// Retry settings shared by every call of a client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt. `3` means up to 4 attempts.
    pub max_retries: usize,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
    /// Which outcomes are retryable.
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on: RetryOn::default(),
        }
    }
}

/// What the client does after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Not retryable: hand the outcome to the response classifier.
    Stop,
    /// Retryable and within budget: wait this long, then try again.
    Retry(Duration),
    /// Retryable but the budget is spent.
    Exhausted,
}

impl RetryConfig {
    /// Decides what follows an attempt, given how many retries came before it.
    ///
    /// # Examples
    ///
    /// ```
    /// use controlplane_client::retry::{AttemptOutcome, RetryConfig, RetryDecision};
    ///
    /// let config = RetryConfig::default();
    /// assert_eq!(config.decide(AttemptOutcome::Status(404), 0), RetryDecision::Stop);
    /// assert!(matches!(
    ///     config.decide(AttemptOutcome::Status(503), 0),
    ///     RetryDecision::Retry(_)
    /// ));
    /// assert_eq!(
    ///     config.decide(AttemptOutcome::Status(503), 3),
    ///     RetryDecision::Exhausted
    /// );
    /// ```
    pub fn decide(&self, outcome: AttemptOutcome, retries_done: usize) -> RetryDecision {
        if !self.retry_on.should_retry(outcome, retries_done + 1) {
            return RetryDecision::Stop;
        }
        if retries_done >= self.max_retries {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry(self.backoff.delay(retries_done + 1))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.backoff.min_wait > self.backoff.max_wait {
            return Err(Error::Configuration(format!(
                "retry wait min {:?} exceeds max {:?}",
                self.backoff.min_wait, self.backoff.max_wait
            )));
        }
        if !(0.0..1.0).contains(&self.backoff.jitter) {
            return Err(Error::Configuration(format!(
                "retry jitter {} must be in [0, 1)",
                self.backoff.jitter
            )));
        }
        Ok(())
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
pub(crate) async fn wait(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_exponential_backoff_delays() {
        let backoff = Backoff {
            jitter: 0.0,
            ..Backoff::default()
        };

        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(6), Duration::from_millis(3200));
        assert_eq!(backoff.delay(7), Duration::from_secs(5));
        assert_eq!(backoff.delay(200), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let backoff = Backoff::default();

        for retry in 1..=10 {
            let bound = Duration::from_millis(100)
                .saturating_mul(1 << (retry - 1))
                .min(Duration::from_secs(5));
            assert_eq!(backoff.base_delay(retry), bound);

            for _ in 0..50 {
                let delay = backoff.delay(retry);
                assert!(
                    delay >= bound.mul_f64(0.9) && delay <= bound.mul_f64(1.1),
                    "retry {} delay {:?} outside +/-10% of {:?}",
                    retry,
                    delay,
                    bound
                );
            }
        }
    }

    #[test]
    fn test_jitter_saturates_on_huge_waits() {
        let backoff = Backoff {
            min_wait: Duration::MAX,
            max_wait: Duration::MAX,
            jitter: 0.5,
        };

        for retry in 1..=20 {
            let delay = backoff.delay(retry);
            assert!(delay >= Duration::MAX / 4, "retry {} delay {:?}", retry, delay);
        }
    }

    #[test]
    fn test_default_policy_outcomes() {
        let retry_on = RetryOn::default();

        assert!(retry_on.should_retry(AttemptOutcome::NetworkError, 1));
        assert!(retry_on.should_retry(AttemptOutcome::Status(0), 1));
        assert!(retry_on.should_retry(AttemptOutcome::Status(429), 1));
        assert!(retry_on.should_retry(AttemptOutcome::Status(500), 1));
        assert!(retry_on.should_retry(AttemptOutcome::Status(503), 1));
        assert!(!retry_on.should_retry(AttemptOutcome::Status(200), 1));
        assert!(!retry_on.should_retry(AttemptOutcome::Status(204), 1));
        assert!(!retry_on.should_retry(AttemptOutcome::Status(400), 1));
        assert!(!retry_on.should_retry(AttemptOutcome::Status(404), 1));
    }

    #[test]
    fn test_budget_exhaustion() {
        let config = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };

        assert!(matches!(
            config.decide(AttemptOutcome::NetworkError, 0),
            RetryDecision::Retry(_)
        ));
        assert!(matches!(
            config.decide(AttemptOutcome::NetworkError, 1),
            RetryDecision::Retry(_)
        ));
        assert_eq!(
            config.decide(AttemptOutcome::NetworkError, 2),
            RetryDecision::Exhausted
        );
        assert_eq!(config.decide(AttemptOutcome::Status(400), 2), RetryDecision::Stop);
    }

    #[test]
    fn test_zero_retries_exhausts_immediately() {
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };

        assert_eq!(
            config.decide(AttemptOutcome::Status(429), 0),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_custom_predicate_sees_attempt_number() {
        struct FirstAttemptOnly;
        impl RetryPredicate for FirstAttemptOnly {
            fn should_retry(&self, _outcome: AttemptOutcome, attempt: usize) -> bool {
                attempt == 1
            }
        }

        let config = RetryConfig {
            max_retries: 5,
            retry_on: RetryOn::Custom(Arc::new(FirstAttemptOnly)),
            ..RetryConfig::default()
        };

        assert!(matches!(
            config.decide(AttemptOutcome::Status(409), 0),
            RetryDecision::Retry(_)
        ));
        assert_eq!(config.decide(AttemptOutcome::Status(409), 1), RetryDecision::Stop);
    }

    #[test]
    fn test_validate_rejects_inverted_waits() {
        let config = RetryConfig {
            backoff: Backoff {
                min_wait: Duration::from_secs(10),
                max_wait: Duration::from_secs(1),
                jitter: 0.1,
            },
            ..RetryConfig::default()
        };

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = wait(Duration::from_secs(10), &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_completes_without_cancellation() {
        let cancel = CancellationToken::new();
        assert!(wait(Duration::from_millis(5), &cancel).await.is_ok());
    }
}
