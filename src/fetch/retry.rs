//! Retry logic with exponential backoff for transient fetch failures.
//!
//! # Overview
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - temporary failures that may succeed on retry
//! - [`FailureType::Permanent`] - failures that won't succeed regardless of retries
//! - [`FailureType::RateLimited`] - server rate limiting (HTTP 429)
//!
//! [`RetryPolicy::should_retry`] is the pure decision function;
//! [`RetryPolicy::execute`] drives an async operation through it and returns a
//! tagged [`RetryOutcome`] instead of an error.
//!
//! # Example
//!
//! ```
//! use regfetch_core::fetch::{FetchError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::http_status("https://www.federalregister.gov/api/v1/documents.json", 503);
//! let failure_type = classify_error(&error);
//! assert_eq!(failure_type, FailureType::Transient);
//!
//! match policy.should_retry(failure_type, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::FetchError;
use super::constants::{DEFAULT_RATE_LIMIT_WAIT, JITTER_FRACTION, MAX_RETRY_AFTER};

/// Default maximum attempts (including the first).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (60 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: timeout, connection refused, 5xx server errors.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, invalid URL, unparseable body.
    Permanent,

    /// Server rate limiting (HTTP 429).
    ///
    /// Retried; the wait honors Retry-After when the server sends one.
    RateLimited,
}

/// Decision on whether to retry a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Result of driving an operation through [`RetryPolicy::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation succeeded.
    Success {
        /// The operation's value.
        value: T,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// The operation hit a failure that retrying cannot fix.
    PermanentFailure {
        /// Last error message.
        reason: String,
        /// Attempts used.
        attempts: u32,
    },
    /// Every allowed attempt failed with a retryable error.
    Exhausted {
        /// Last error message.
        reason: String,
        /// Attempts used.
        attempts: u32,
    },
}

impl<T> RetryOutcome<T> {
    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::PermanentFailure { attempts, .. }
            | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// True for [`RetryOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Consumes the outcome, keeping only a successful value.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::PermanentFailure { .. } | Self::Exhausted { .. } => None,
        }
    }

    /// Failure message, if the outcome is not a success.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::PermanentFailure { reason, .. } | Self::Exhausted { reason, .. } => Some(reason),
        }
    }
}

/// Errors that the retry executor knows how to classify.
pub trait Retryable {
    /// How retrying should treat this error.
    fn failure_type(&self) -> FailureType;

    /// Server-mandated wait before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn failure_type(&self) -> FailureType {
        classify_error(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus {
                retry_after: Some(value),
                ..
            } => parse_retry_after(value),
            _ => None,
        }
    }
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 60 seconds
/// - `backoff_multiplier`: 2.0
/// - `jitter`: on (up to 10% of the delay)
/// - `rate_limit_wait`: 30 seconds
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f64,

    /// Whether to add random jitter.
    jitter: bool,

    /// Wait for a 429 without a usable Retry-After.
    rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (clamped to >= 1)
    /// * `base_delay` - Base delay for first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the wait used for a 429 without Retry-After.
    #[must_use]
    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the delay cap.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Determines whether to retry a failed operation.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
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

    /// Backoff for `attempt` without jitter:
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = base_ms * self.backoff_multiplier.powi(exponent);

        let capped_ms = if delay_ms.is_finite() {
            delay_ms.clamp(0.0, max_ms)
        } else {
            max_ms
        };

        Duration::from_millis(capped_ms as u64)
    }

    /// Calculates the delay for a retry attempt with exponential backoff and jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_delay(attempt);
        if self.jitter {
            backoff + calculate_jitter(backoff)
        } else {
            backoff
        }
    }

    /// Wait before retrying a rate-limited request.
    ///
    /// A server-supplied value wins, capped at `max_delay`; otherwise the fixed
    /// rate-limit wait applies.
    #[must_use]
    pub fn rate_limit_delay(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) => delay.min(self.max_delay),
            None => self.rate_limit_wait,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The closure receives the 1-indexed attempt number. It must be safe to
    /// invoke more than once.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting operation");

            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    let failure_type = error.failure_type();
                    match self.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay: backoff_delay,
                            attempt: next_attempt,
                        } => {
                            let retry_after = error.retry_after();
                            let delay = if failure_type == FailureType::RateLimited {
                                self.rate_limit_delay(retry_after)
                            } else {
                                backoff_delay
                            };

                            info!(
                                attempt = next_attempt,
                                max_attempts = self.max_attempts,
                                delay_ms = delay.as_millis(),
                                using_retry_after = retry_after.is_some(),
                                error = %error,
                                "retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(%reason, error = %error, "not retrying");
                            let reason = error.to_string();
                            return if failure_type == FailureType::Permanent {
                                RetryOutcome::PermanentFailure {
                                    reason,
                                    attempts: attempt,
                                }
                            } else {
                                RetryOutcome::Exhausted {
                                    reason,
                                    attempts: attempt,
                                }
                            };
                        }
                    }
                }
            }
        }
    }
}

/// Random jitter between 0 and [`JITTER_FRACTION`] of `delay`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn calculate_jitter(delay: Duration) -> Duration {
    let ceiling_ms = (delay.as_millis() as f64 * JITTER_FRACTION) as u64;
    if ceiling_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=ceiling_ms);
    Duration::from_millis(jitter_ms)
}

/// Classifies a fetch error into a failure type for retry decisions.
///
/// # HTTP Status Code Classification
///
/// | Status | Type | Rationale |
/// |--------|------|-----------|
/// | 400 | Permanent | Bad request - won't succeed on retry |
/// | 401 | Permanent | Unauthorized - public registry, no credentials to add |
/// | 403 | Permanent | Forbidden |
/// | 404 | Permanent | Not found - resource doesn't exist |
/// | 408 | Permanent | Request timeout - client error, not retried |
/// | 410 | Permanent | Gone - permanently removed |
/// | 429 | RateLimited | Rate limited - retry after the server's wait |
/// | 5xx | Transient | Server error - may be temporary |
/// | other | Transient | Unexpected status surfaced as an error |
///
/// # Non-HTTP Errors
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network | Transient |
/// | InvalidUrl | Permanent |
/// | Parse | Permanent |
/// | ClientBuild | Permanent |
#[instrument(level = "trace")]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } | FetchError::Network { .. } => FailureType::Transient,
        FetchError::InvalidUrl { .. }
        | FetchError::Parse { .. }
        | FetchError::ClientBuild { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code into a failure type.
#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited, // Too Many Requests

        // Client errors are permanent
        status if (400..500).contains(&status) => FailureType::Permanent,

        // Server errors are transient
        status if (500..600).contains(&status) => FailureType::Transient,

        // 1xx/3xx surfaced as errors: assume the next try may differ
        _ => FailureType::Transient,
    }
}

/// Parses a Retry-After header value into a delay.
///
/// Accepts integer or decimal seconds, or an RFC 7231 HTTP-date. Negative
/// values are rejected, past dates yield zero, and everything is capped at one
/// hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    if let Ok(seconds) = header_value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(header_value, "invalid fractional Retry-After value, ignoring");
            return None;
        }
        if seconds > MAX_RETRY_AFTER.as_secs_f64() {
            return Some(MAX_RETRY_AFTER);
        }
        return Some(Duration::from_secs_f64(seconds));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
            Err(_) => {
                debug!(header_value, "Retry-After date is in the past");
                Some(Duration::ZERO)
            }
        },
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::SystemTime;

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        )
        .with_rate_limit_wait(Duration::from_millis(1))
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(policy.jitter);
        assert_eq!(policy.rate_limit_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 2.0);
        assert_eq!(policy.max_attempts(), 1);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_monotonic_and_capped() {
        let policy = RetryPolicy::new(50, Duration::from_secs(1), Duration::from_secs(60), 2.0);
        let mut previous = Duration::ZERO;
        for attempt in 1..=50 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay >= previous, "delay decreased at attempt {attempt}");
            assert!(delay <= Duration::from_secs(60));
            previous = delay;
        }
        assert_eq!(policy.backoff_delay(50), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_survives_overflowing_exponent() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(5), 10.0);
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_within_ten_percent() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.calculate_delay(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_jitter_disabled() {
        let policy = RetryPolicy::default().with_jitter(false);
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_rate_limit_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_delay(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.rate_limit_delay(Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
        assert_eq!(policy.rate_limit_delay(None), Duration::from_secs(30));
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_classify_client_errors_permanent() {
        for status in [400, 401, 403, 404, 410, 451] {
            let error = FetchError::http_status("http://example.gov", status);
            assert_eq!(classify_error(&error), FailureType::Permanent, "{status}");
        }
    }

    #[test]
    fn test_classify_server_errors_transient() {
        for status in [500, 502, 503, 504, 599] {
            let error = FetchError::http_status("http://example.gov", status);
            assert_eq!(classify_error(&error), FailureType::Transient, "{status}");
        }
    }

    #[test]
    fn test_classify_http_429_rate_limited() {
        let error = FetchError::http_status("http://example.gov", 429);
        assert_eq!(classify_error(&error), FailureType::RateLimited);
    }

    #[test]
    fn test_classify_unexpected_status_transient() {
        let error = FetchError::http_status("http://example.gov", 304);
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    #[test]
    fn test_classify_request_timeout_status_permanent() {
        for status in [405, 408, 409, 422] {
            let error = FetchError::http_status("http://example.gov", status);
            assert_eq!(classify_error(&error), FailureType::Permanent, "{status}");
        }
    }

    #[tokio::test]
    async fn test_execute_stops_on_http_408() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome: RetryOutcome<()> = fast_policy(3)
            .execute(move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::http_status("http://example.gov", 408))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, RetryOutcome::PermanentFailure { .. }));
    }

    #[test]
    fn test_classify_non_http_errors() {
        assert_eq!(
            classify_error(&FetchError::timeout("http://example.gov")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&FetchError::invalid_url("nope")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&FetchError::parse("http://example.gov", "bad json")),
            FailureType::Permanent
        );
    }

    // ==================== Should Retry Decision Tests ====================

    #[test]
    fn test_should_retry_permanent_does_not_retry() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::Permanent, 1);
        assert!(
            matches!(decision, RetryDecision::DoNotRetry { ref reason } if reason.contains("permanent"))
        );
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 3),
            RetryDecision::DoNotRetry { ref reason } if reason.contains("exhausted")
        ));
    }

    // ==================== Retry-After Tests ====================

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_fractional_seconds() {
        assert_eq!(parse_retry_after("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-0.5"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("7200.25"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_negative_rejected() {
        assert_eq!(parse_retry_after("-5"), None);
    }

    #[test]
    fn test_parse_retry_after_capped() {
        assert_eq!(parse_retry_after("999999"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_retry_after_future_date() {
        let future = SystemTime::now() + Duration::from_secs(120);
        let header = httpdate::fmt_http_date(future);
        let delay = parse_retry_after(&header).unwrap();
        assert!(delay <= Duration::from_secs(120));
        assert!(delay >= Duration::from_secs(110));
    }

    #[test]
    fn test_parse_retry_after_garbage() {
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_fetch_error_retry_after_hint() {
        let error =
            FetchError::http_status_with_retry_after("http://example.gov", 429, Some("7".into()));
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(FetchError::timeout("http://example.gov").retry_after(), None);
    }

    // ==================== Execute Tests ====================

    #[tokio::test]
    async fn test_execute_two_transient_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = fast_policy(3)
            .execute(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(FetchError::http_status("http://example.gov", 503))
                    } else {
                        Ok("body")
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome,
            RetryOutcome::Success {
                value: "body",
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_execute_permanent_failure_single_invocation() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome: RetryOutcome<()> = fast_policy(3)
            .execute(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::http_status("http://example.gov/missing", 404))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, RetryOutcome::PermanentFailure { attempts: 1, .. }));
        assert!(outcome.failure_reason().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_execute_exhausted() {
        let outcome: RetryOutcome<()> = fast_policy(2)
            .execute(|_| async { Err(FetchError::timeout("http://example.gov")) })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 2, .. }));
        assert_eq!(outcome.attempts(), 2);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_execute_passes_attempt_number() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let outcome = fast_policy(3)
            .execute(|attempt| {
                log.lock().unwrap().push(attempt);
                async move {
                    if attempt == 1 {
                        Err(FetchError::http_status_with_retry_after(
                            "http://example.gov",
                            429,
                            Some("0".to_string()),
                        ))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(outcome.into_value(), Some(2));
    }
}
