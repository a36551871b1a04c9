//! Client-resilience core for the CAD plugin.
//!
//! Generic primitives consumed by the plugin's commands and background tasks:
//! a retry executor for outbound calls, an ambient correlation token, a daily
//! file logger tagged with that token, and content fingerprinting.

pub mod config;
pub mod fingerprint;
pub mod observability;
pub mod resilience;

pub use config::CoreConfig;
pub use fingerprint::{compute_hash, FingerprintError};
pub use observability::{CorrelationToken, FileLogger};
pub use resilience::{Classify, FailureKind, RetryError, RetryExecutor, RetryPolicy};
