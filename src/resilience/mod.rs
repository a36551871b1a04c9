//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → retries.rs (attempt loop, fixed delay, cancellation)
//!     → timeouts.rs (optional per-attempt deadline)
//!     → On failure: classify.rs (transient → retry, permanent → surface)
//! ```
//!
//! # Design Decisions
//! - Only transient failures are retried
//! - Caller cancellation always wins over retrying
//! - The original failure reaches the caller untouched

pub mod classify;
pub mod retries;
mod timeouts;

pub use classify::{Classify, FailureKind, OperationError};
pub use retries::{PolicyError, RetryError, RetryExecutor, RetryPolicy, DEFAULT_DELAY};
