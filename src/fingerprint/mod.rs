//! Content fingerprinting.
//!
//! # Data Flow
//! ```text
//! file path
//!     → hasher.rs (open read-only, stream 64 KiB chunks through SHA-256)
//!     → 64-char lowercase hex digest
//!     → dedup / change-detection layers compare strings
//! ```
//!
//! # Design Decisions
//! - Bounded memory regardless of file size
//! - Digest depends on bytes only, never on path or metadata
//! - I/O failures surface unchanged; no retry

pub mod hasher;

pub use hasher::{compute_hash, compute_hash_async, hash_reader};

use thiserror::Error;

/// Errors raised while fingerprinting.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("fingerprint path is empty")]
    EmptyPath,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The blocking hash task panicked or was cancelled.
    #[error("fingerprint task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
