//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap a single attempt with an optional deadline
//! - Cancel the attempt's token cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A deadline is not the caller cancelling, so it stays retryable

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Result of running an attempt under an optional deadline.
#[derive(Debug)]
pub(crate) enum Bounded<R> {
    Completed(R),
    TimedOut(Duration),
}

/// Run `fut`, giving up after `deadline` if one is set.
///
/// On timeout `attempt_token` is cancelled so the abandoned work can observe it.
pub(crate) async fn run_bounded<F>(
    fut: F,
    deadline: Option<Duration>,
    attempt_token: &CancellationToken,
) -> Bounded<F::Output>
where
    F: Future,
{
    match deadline {
        None => Bounded::Completed(fut.await),
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(output) => Bounded::Completed(output),
            Err(_) => {
                attempt_token.cancel();
                Bounded::TimedOut(limit)
            }
        },
    }
}
