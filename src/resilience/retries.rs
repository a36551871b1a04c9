//! Retry logic.
//!
//! # Responsibilities
//! - Run an async operation up to `max_attempts` times
//! - Retry only failures classified as transient
//! - Wait a fixed, cancellable delay between attempts
//! - Stop immediately when the caller cancels
//!
//! # Design Decisions
//! - Policy is validated once and never mutated
//! - The original failure is surfaced unchanged, never wrapped in a generic error
//! - No logging or I/O here; callers compose with `FileLogger` if they want a trail
//! - Each attempt gets a child cancellation token so a per-attempt deadline
//!   never cancels the caller

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::resilience::classify::Classify;
use crate::resilience::timeouts::{run_bounded, Bounded};

/// Delay used when the caller does not specify one.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(400);

/// Invalid retry policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be greater than 0")]
    ZeroAttempts,

    #[error("attempt timeout must be greater than 0")]
    ZeroAttemptTimeout,
}

/// Failure surfaced by [`RetryExecutor::execute`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation's own failure, exactly as it returned it.
    #[error(transparent)]
    Operation(E),

    /// The last attempt exceeded the per-attempt deadline.
    #[error("attempt timed out after {0:?}")]
    AttemptTimedOut(Duration),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The loop ended without running or recording anything.
    #[error("retry loop finished without recording a failure")]
    NoAttempts,
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    /// The operation's failure, if that is what ended the loop.
    pub fn into_operation(self) -> Option<E> {
        match self {
            RetryError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: Classify> RetryError<E> {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RetryError::Operation(e) => e.classify().is_transient(),
            RetryError::AttemptTimedOut(_) => true,
            RetryError::Cancelled | RetryError::NoAttempts => false,
        }
    }
}

/// Immutable retry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Build a policy; `delay` falls back to [`DEFAULT_DELAY`].
    pub fn new(max_attempts: u32, delay: Option<Duration>) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            delay: delay.unwrap_or(DEFAULT_DELAY),
            attempt_timeout: None,
        })
    }

    /// Bound every attempt; an expired attempt counts as transient.
    ///
    /// A zero timeout is rejected, matching `retries.attempt_timeout_ms` validation.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Result<Self, PolicyError> {
        if timeout.is_zero() {
            return Err(PolicyError::ZeroAttemptTimeout);
        }
        self.attempt_timeout = Some(timeout);
        Ok(self)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(config: &RetryConfig) -> Result<Self, Self::Error> {
        let policy = RetryPolicy::new(config.max_attempts, Some(config.delay()))?;
        match config.attempt_timeout() {
            Some(timeout) => policy.with_attempt_timeout(timeout),
            None => Ok(policy),
        }
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// Stateless apart from the policy, so one executor can serve many
/// concurrent `execute` calls.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor, rejecting `max_attempts == 0`.
    pub fn new(max_attempts: u32, delay: Option<Duration>) -> Result<Self, PolicyError> {
        Ok(Self::with_policy(RetryPolicy::new(max_attempts, delay)?))
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, PolicyError> {
        RetryPolicy::try_from(config).map(Self::with_policy)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// `operation` receives a child of `cancel` for each attempt.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let attempt_token = cancel.child_token();
            let bounded = run_bounded(
                operation(attempt_token.clone()),
                self.policy.attempt_timeout,
                &attempt_token,
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = bounded => outcome,
            };

            let failure = match outcome {
                Bounded::Completed(Ok(value)) => return Ok(value),
                // The operation may have bailed out because it saw the caller's token.
                Bounded::Completed(Err(_)) if cancel.is_cancelled() => {
                    return Err(RetryError::Cancelled)
                }
                Bounded::Completed(Err(e)) => RetryError::Operation(e),
                Bounded::TimedOut(limit) => RetryError::AttemptTimedOut(limit),
            };

            if attempt == max_attempts || !failure.is_transient() {
                return Err(failure);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }

        Err(RetryError::NoAttempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classify::OperationError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counting() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert_eq!(RetryExecutor::new(0, None).unwrap_err(), PolicyError::ZeroAttempts);
        assert_eq!(
            RetryPolicy::new(0, Some(Duration::ZERO)).unwrap_err(),
            PolicyError::ZeroAttempts
        );
    }

    #[test]
    fn test_default_delay() {
        let executor = RetryExecutor::new(2, None).unwrap();
        assert_eq!(executor.policy().delay(), Duration::from_millis(400));
        assert_eq!(executor.policy().max_attempts(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_attempts: 5,
            delay_ms: 10,
            attempt_timeout_ms: Some(200),
        };
        let executor = RetryExecutor::from_config(&config).unwrap();
        assert_eq!(executor.policy().max_attempts(), 5);
        assert_eq!(executor.policy().delay(), Duration::from_millis(10));
        assert_eq!(executor.policy().attempt_timeout(), Some(Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_runs_every_attempt() {
        for n in 1..=4u32 {
            let executor = RetryExecutor::new(n, None).unwrap();
            let calls = counting();
            let cancel = CancellationToken::new();

            let result: Result<(), _> = executor
                .execute(
                    |_| {
                        let calls = calls.clone();
                        async move {
                            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                            Err(OperationError::Connect(format!("attempt {attempt}")))
                        }
                    },
                    &cancel,
                )
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), n);
            match result.unwrap_err().into_operation() {
                Some(OperationError::Connect(msg)) => assert_eq!(msg, format!("attempt {n}")),
                other => panic!("unexpected failure: {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_kth_attempt() {
        let executor = RetryExecutor::new(5, Some(Duration::from_millis(50))).unwrap();
        let calls = counting();
        let cancel = CancellationToken::new();

        let value = executor
            .execute(
                |_| {
                    let calls = calls.clone();
                    async move {
                        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if attempt < 3 {
                            Err(OperationError::Protocol("reset".into()))
                        } else {
                            Ok(attempt * 10)
                        }
                    }
                },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(value, 30);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_not_retried() {
        let executor = RetryExecutor::new(10, None).unwrap();
        let calls = counting();
        let cancel = CancellationToken::new();

        let err = executor
            .execute(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(OperationError::Unauthorized("expired token".into()))
                    }
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.to_string(), "unauthorized: expired token");
        assert!(matches!(err.into_operation(), Some(OperationError::Unauthorized(m)) if m == "expired token"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let executor = RetryExecutor::new(3, None).unwrap();
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let _ = executor
            .execute(
                |_| async { Err::<(), _>(OperationError::Timeout(Duration::from_secs(1))) },
                &cancel,
            )
            .await;

        // Two waits of 400ms, none after the final attempt.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(800), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1200), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_retrying() {
        let executor = RetryExecutor::new(5, Some(Duration::from_secs(10))).unwrap();
        let calls = counting();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = executor
            .execute(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(OperationError::Connect("refused".into()))
                    }
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt() {
        let executor = RetryExecutor::new(3, None).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor
            .execute(
                |_| async {
                    std::future::pending::<()>().await;
                    Ok::<_, OperationError>(())
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let executor = RetryExecutor::new(3, None).unwrap();
        let calls = counting();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, OperationError>(())
                    }
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_transient() {
        let policy = RetryPolicy::new(2, Some(Duration::from_millis(10)))
            .unwrap()
            .with_attempt_timeout(Duration::from_millis(100))
            .unwrap();
        let executor = RetryExecutor::with_policy(policy);
        let calls = counting();
        let cancel = CancellationToken::new();

        let err = executor
            .execute(
                |token: CancellationToken| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        token.cancelled().await;
                        Err::<(), _>(OperationError::Internal("should not surface".into()))
                    }
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::AttemptTimedOut(d) if d == Duration::from_millis(100)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_attempt_token_is_child_of_caller() {
        let executor = RetryExecutor::new(1, None).unwrap();
        let cancel = CancellationToken::new();

        let seen = executor
            .execute(
                |token: CancellationToken| async move { Ok::<_, OperationError>(token.is_cancelled()) },
                &cancel,
            )
            .await
            .unwrap();

        assert!(!seen);
    }

    #[test]
    fn test_zero_attempt_timeout_rejected() {
        let policy = RetryPolicy::new(3, None).unwrap();
        assert_eq!(
            policy.with_attempt_timeout(Duration::ZERO).unwrap_err(),
            PolicyError::ZeroAttemptTimeout
        );

        let config = RetryConfig {
            max_attempts: 3,
            delay_ms: 10,
            attempt_timeout_ms: Some(0),
        };
        assert_eq!(
            RetryExecutor::from_config(&config).unwrap_err(),
            PolicyError::ZeroAttemptTimeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_caller_cancel_reports_cancelled() {
        let executor = RetryExecutor::new(5, None).unwrap();
        let calls = counting();
        let cancel = CancellationToken::new();

        let err = executor
            .execute(
                |_| {
                    let calls = calls.clone();
                    let caller = cancel.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        caller.cancel();
                        Err::<(), _>(OperationError::Connect("aborted by caller".into()))
                    }
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
