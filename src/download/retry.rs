//! Per-candidate retry policy with exponential backoff.
//!
//! Every failed attempt against a candidate is classified into a
//! [`FailureType`]. The [`RetryPolicy`] then decides whether to re-issue the
//! request against the same candidate or to move on to the next one.
//!
//! | Failure | Decision |
//! |---------|----------|
//! | [`FailureType::NotFound`] | next candidate immediately |
//! | [`FailureType::Transient`] | retry until `max_attempts`, then next candidate |
//! | [`FailureType::Invalid`] | retry until `max_attempts`, then next candidate |
//!
//! A 404 is authoritative: the candidate does not carry the artifact and
//! asking again would not change that.
//!
//! # Example
//!
//! ```
//! use sigmirror_core::download::{DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("http://192.0.2.7/daily.cvd", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => println!("retry #{attempt} in {delay:?}"),
//!     RetryDecision::NextCandidate { reason } => println!("moving on: {reason}"),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, instrument};

use super::DownloadError;

/// Default attempts per candidate (including the first one).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of a failed attempt against one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureType {
    /// The candidate answered 404: it does not have the artifact.
    NotFound,

    /// Connection error, timeout, truncated body or any non-404 error status.
    Transient,

    /// The body was received but failed validation (malformed or stale).
    Invalid,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not-found",
            Self::Transient => "network",
            Self::Invalid => "invalid",
        };
        f.write_str(label)
    }
}

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the request against the same candidate after `delay`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this candidate and advance to the next one.
    NextCandidate {
        /// Human-readable reason for leaving the candidate.
        reason: String,
    },
}

/// Configuration for per-candidate retries with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 32 seconds
/// - `backoff_multiplier`: 2.0
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// A zero `base_delay` disables both the pause and the jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts per candidate (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with custom attempts and base delay, defaults elsewhere.
    #[must_use]
    pub fn with_attempts_and_delay(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts per candidate.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after `attempt` (1-indexed) failed with `failure_type`.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::NotFound {
            return RetryDecision::NextCandidate {
                reason: "candidate does not have the artifact".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::NextCandidate {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Formula: `min(base_delay * multiplier^(attempt - 1), max_delay) + jitter`
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    /// Random jitter between 0 and `MAX_JITTER`.
    #[allow(clippy::cast_possible_truncation, clippy::unused_self)]
    fn calculate_jitter(&self) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a transport-level error.
///
/// Only a 404 is treated as "this candidate lacks the artifact". Every other
/// status (including 410 and 5xx), timeouts, connection failures and short
/// bodies are transient against the same candidate.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    if error.is_not_found() {
        FailureType::NotFound
    } else {
        FailureType::Transient
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!((policy.backoff_multiplier - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_attempts_and_delay(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_delay_calculation_first_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        let delay = policy.calculate_delay(1);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_delay_calculation_third_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        let delay = policy.calculate_delay(3);
        assert!(delay >= Duration::from_secs(4));
        assert!(delay <= Duration::from_millis(4500));
    }

    #[test]
    fn test_delay_calculation_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let delay = policy.calculate_delay(6);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay <= Duration::from_millis(5500));
    }

    #[test]
    fn test_zero_base_delay_means_no_pause() {
        let policy = RetryPolicy::with_attempts_and_delay(3, Duration::ZERO);
        assert_eq!(policy.calculate_delay(1), Duration::ZERO);
        assert_eq!(policy.calculate_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.calculate_jitter() <= MAX_JITTER);
        }
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_404_not_found() {
        let error = DownloadError::http_status("http://192.0.2.1/main.cvd", 404);
        assert_eq!(classify_error(&error), FailureType::NotFound);
    }

    #[test]
    fn test_classify_other_statuses_transient() {
        for status in [400, 403, 410, 429, 500, 502, 503, 504] {
            let error = DownloadError::http_status("http://192.0.2.1/main.cvd", status);
            assert_eq!(
                classify_error(&error),
                FailureType::Transient,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_classify_timeout_transient() {
        let error = DownloadError::timeout("http://192.0.2.1/main.cvd");
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    #[test]
    fn test_classify_truncated_body_transient() {
        let error = DownloadError::integrity("http://192.0.2.1/main.cvd", 10, 5);
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    // ==================== Decision Tests ====================

    #[test]
    fn test_not_found_moves_on_without_retry() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::NotFound, 1);
        assert!(matches!(decision, RetryDecision::NextCandidate { .. }));
    }

    #[test]
    fn test_invalid_is_retried_on_same_candidate() {
        let policy = RetryPolicy::with_attempts_and_delay(3, Duration::ZERO);
        let decision = policy.should_retry(FailureType::Invalid, 1);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::ZERO,
                attempt: 2
            }
        );
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_attempts_and_delay(3, Duration::ZERO);

        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { .. }
        ));

        let decision = policy.should_retry(FailureType::Transient, 3);
        match decision {
            RetryDecision::NextCandidate { reason } => assert!(reason.contains("exhausted")),
            other => panic!("Expected NextCandidate, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_type_labels() {
        assert_eq!(FailureType::NotFound.to_string(), "not-found");
        assert_eq!(FailureType::Transient.to_string(), "network");
        assert_eq!(FailureType::Invalid.to_string(), "invalid");
    }

    #[test]
    fn test_default_max_retries_constant() {
        assert_eq!(DEFAULT_MAX_RETRIES, 3);
    }
}
