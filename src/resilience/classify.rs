//! Failure classification.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating unchanged
//! - Provide a ready-made request-layer error taxonomy
//! - Classify the transport errors callers commonly wrap (io, reqwest)
//!
//! # Design Decisions
//! - Classification is a function over the error's kind, not a list of types
//! - Connection and protocol faults are transient; timeouts are transient
//! - Anything unrecognised is permanent

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recoverable by retrying unchanged (dropped connection, timeout).
    Transient,
    /// Retrying cannot fix it (bad input, auth failure, bug).
    Permanent,
}

impl FailureKind {
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Errors that know whether they are worth retrying.
pub trait Classify {
    fn classify(&self) -> FailureKind;
}

/// General request-layer failure for operations that have no error type of their own.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Downstream could not be reached or the connection dropped.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange started but broke at the protocol level.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The call was aborted by a deadline rather than by the caller.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Request was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Downstream refused the caller's credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Programming error or unexpected state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Classify for OperationError {
    fn classify(&self) -> FailureKind {
        match self {
            OperationError::Connect(_) | OperationError::Protocol(_) | OperationError::Timeout(_) => {
                FailureKind::Transient
            }
            OperationError::InvalidInput(_)
            | OperationError::Unauthorized(_)
            | OperationError::Internal(_) => FailureKind::Permanent,
        }
    }
}

impl Classify for io::Error {
    fn classify(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::UnexpectedEof => FailureKind::Transient,
            _ => FailureKind::Permanent,
        }
    }
}

impl Classify for reqwest::Error {
    fn classify(&self) -> FailureKind {
        // A status error means the server answered; the request layer worked.
        if self.is_status() || self.is_builder() || self.is_decode() {
            return FailureKind::Permanent;
        }
        if self.is_connect() || self.is_timeout() || self.is_request() || self.is_body() {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        }
    }
}
