//! Ambient correlation tokens.
//!
//! # Responsibilities
//! - Hold the run identifier for the current logical execution context
//! - Fork the identifier into spawned tasks and blocking closures
//! - Keep unrelated contexts isolated from each other
//!
//! # Design Decisions
//! - Backed by a Tokio task-local, so every context has its own slot
//! - A fork copies the value at spawn time; later writes stay on their side
//! - Writing outside any context is an error instead of a silent global
//!
//! # Usage
//! - Open a context with [`scope`] (async) or [`sync_scope`] (threads, sync
//!   entry points) before calling [`set`]; outside one, `set` and `clear`
//!   return [`CorrelationError::NoContext`]
//! - Fork with [`spawn`] / [`spawn_blocking`], not `tokio::spawn`: a task
//!   started with plain `tokio::spawn` sees no token

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_RUN: RefCell<Option<CorrelationToken>>;
}

/// Opaque identifier tying together the log lines and calls of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random token (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrelationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("no correlation context is active on this task or thread")]
    NoContext,
}

/// Token bound in the current context, if any.
pub fn get() -> Option<CorrelationToken> {
    CURRENT_RUN
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Bind `token` in the current context.
///
/// Visible to the caller and to anything forked from it afterwards.
pub fn set(token: impl Into<CorrelationToken>) -> Result<(), CorrelationError> {
    let token = token.into();
    CURRENT_RUN
        .try_with(|slot| {
            slot.replace(Some(token));
        })
        .map_err(|_| CorrelationError::NoContext)
}

/// Unbind the token in the current context.
pub fn clear() -> Result<(), CorrelationError> {
    CURRENT_RUN
        .try_with(|slot| {
            slot.replace(None);
        })
        .map_err(|_| CorrelationError::NoContext)
}

/// Run `fut` in a fresh context starting with `token`.
pub fn scope<F>(token: Option<CorrelationToken>, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    CURRENT_RUN.scope(RefCell::new(token), fut)
}

/// Run `f` in a fresh context starting with `token`.
///
/// Use this at the top of plain threads and other synchronous entry points.
pub fn sync_scope<F, R>(token: Option<CorrelationToken>, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_RUN.sync_scope(RefCell::new(token), f)
}

/// `tokio::spawn` that forks the current token into the new task.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(scope(get(), fut))
}

/// `tokio::task::spawn_blocking` that forks the current token into the closure.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let token = get();
    tokio::task::spawn_blocking(move || sync_scope(token, f))
}
