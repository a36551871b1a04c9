//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Plugin commands / background tasks:
//!     → correlation.rs (ambient run token per execution context)
//!     → logging.rs (daily file, lines tagged with the run token)
//!
//! Crate diagnostics:
//!     → tracing events → stderr via tracing-subscriber
//! ```
//!
//! # Design Decisions
//! - Run token flows implicitly; no signature carries it
//! - File log format is plain text, one record per line
//! - Console diagnostics level configurable via config and RUST_LOG

pub mod correlation;
pub mod logging;

pub use correlation::{CorrelationError, CorrelationToken};
pub use logging::{FileLogger, Level, LogRecord, LoggingError};

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}
