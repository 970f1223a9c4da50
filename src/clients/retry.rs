//! Bounded retry with a fixed delay.
//!
//! [`RetryController::execute`] drives one logical call through its attempts:
//!
//! - a successful attempt ends the loop
//! - a cancellation, an interceptor failure or an invalid request ends the
//!   loop immediately and is returned as is
//! - any other failure is retried after [`RetryPolicy::delay`] until
//!   [`RetryPolicy::max_retries`] retries have been made
//!
//! The delay is constant between attempts. Status-aware filtering is layered
//! on top through a [`RetryClassifier`] such as [`StatusAllowlist`].

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::errors::RequestError;
use crate::clients::fingerprint::CancelToken;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Status codes [`StatusAllowlist::default`] treats as transient.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Decides whether a non-cancellation failure is worth another attempt.
pub trait RetryClassifier: Send + Sync {
    /// Returns `true` to retry after `error` on the given attempt (1-based).
    fn should_retry(&self, error: &RequestError, attempt: u32) -> bool;
}

/// Retries network failures and the listed HTTP statuses only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusAllowlist {
    statuses: BTreeSet<u16>,
}

impl StatusAllowlist {
    /// Creates an allowlist from the given status codes.
    #[must_use]
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }

    /// Returns `true` if the status is in the allowlist.
    #[must_use]
    pub fn contains(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }
}

impl Default for StatusAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_RETRYABLE_STATUSES)
    }
}

impl RetryClassifier for StatusAllowlist {
    fn should_retry(&self, error: &RequestError, _attempt: u32) -> bool {
        match error {
            RequestError::Network { .. } => true,
            RequestError::HttpStatus { status, .. } => self.contains(*status),
            _ => false,
        }
    }
}

/// How many times and how often a call is retried.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use request_layer::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(250));
/// assert_eq!(policy.max_retries(), 3);
/// assert_eq!(policy.max_attempts(), 4);
///
/// assert_eq!(RetryPolicy::disabled().max_retries(), 0);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
    classifier: Option<Arc<dyn RetryClassifier>>,
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` retries after the first attempt.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            classifier: None,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, DEFAULT_RETRY_DELAY)
    }

    /// Adds a classifier consulted before each retry.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replaces the number of retries, keeping delay and classifier.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the delay, keeping retry count and classifier.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    fn allows_retry(&self, error: &RequestError, attempt: u32) -> bool {
        self.classifier
            .as_ref()
            .map_or(true, |classifier| classifier.should_retry(error, attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

/// Runs an attempt function under a [`RetryPolicy`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryController;

impl RetryController {
    /// Invokes `attempt` until it succeeds, is canceled, or the policy is
    /// exhausted. The attempt number passed to `attempt` starts at 1.
    ///
    /// A cancellation of `cancel` during the delay ends the loop with
    /// [`RequestError::Cancelled`].
    ///
    /// # Errors
    ///
    /// - the original error for a failure that is never retried (see
    ///   [`RequestError::is_retryable`]), a classifier veto, or any failure
    ///   when the policy allows no retries
    /// - [`RequestError::RetriesExhausted`] wrapping the last error once all
    ///   retries have failed
    pub async fn execute<T, F, Fut>(
        policy: &RetryPolicy,
        cancel: &CancelToken,
        mut attempt: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries: u32 = 0;
        loop {
            let attempt_number = retries.saturating_add(1);
            let error = match attempt(attempt_number).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if retries >= policy.max_retries {
                if policy.max_retries == 0 {
                    return Err(error);
                }
                return Err(RequestError::RetriesExhausted {
                    attempts: attempt_number,
                    source: Box::new(error),
                });
            }

            if !policy.allows_retry(&error, attempt_number) {
                return Err(error);
            }

            tracing::debug!(
                "Attempt {}/{} failed, retrying in {:?}: {}",
                attempt_number,
                policy.max_attempts(),
                policy.delay,
                error
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(RequestError::Cancelled { reason: cancel.reason() });
                }
                () = tokio::time::sleep(policy.delay) => {}
            }

            retries = retries.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn network_error() -> RequestError {
        RequestError::Network {
            message: "connection reset".to_string(),
            timeout: false,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RequestError>("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_bound_is_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(network_error()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RequestError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert_eq!(*source, network_error());
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_retry_policy_returns_original_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            RetryController::execute(&RetryPolicy::disabled(), &CancelToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(network_error()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err(), network_error());
    }

    #[tokio::test]
    async fn test_cancellation_is_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result: Result<(), _> = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RequestError::Cancelled {
                    reason: "superseded by duplicate request".to_string(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn test_fixed_delay_between_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let started = Instant::now();

        let result = RetryController::execute(&policy, &CancelToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(network_error())
                } else {
                    Ok(json!({"attempt": attempt}))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), json!({"attempt": 3}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_cancel_during_delay_stops_immediately() {
        let calls = AtomicU32::new(0);
        let cancel = CancelToken::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(30));

        let result: Result<(), _> = RetryController::execute(&policy, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel("bulk cancellation");
            async { Err(network_error()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.unwrap_err(),
            RequestError::Cancelled {
                reason: "bulk cancellation".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_classifier_vetoes_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1))
            .with_classifier(Arc::new(StatusAllowlist::default()));

        let result: Result<(), _> = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RequestError::HttpStatus {
                    status: 404,
                    body: json!(null),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().status(), Some(404));
    }

    #[test]
    fn test_status_allowlist_defaults() {
        let allowlist = StatusAllowlist::default();
        for status in DEFAULT_RETRYABLE_STATUSES {
            assert!(allowlist.contains(status));
        }
        assert!(!allowlist.contains(400));
        assert!(allowlist.should_retry(&network_error(), 1));
        assert!(!allowlist.should_retry(
            &RequestError::Interceptor(crate::InterceptorError::new("bad")),
            1
        ));
    }

    #[tokio::test]
    async fn test_invalid_request_is_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RequestError::InvalidRequest(
                    crate::InvalidRequestError::Malformed {
                        message: "builder error".to_string(),
                    },
                ))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_interceptor_failure_is_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = RetryController::execute(&policy, &CancelToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RequestError::Interceptor(crate::InterceptorError::new("bad"))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unbounded_retry_count_does_not_overflow() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(u32::MAX, Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), u32::MAX);

        let result = RetryController::execute(&policy, &CancelToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(network_error())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
