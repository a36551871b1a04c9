//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts > 0, timeouts > 0)
//! - Reject unusable paths before any subsystem touches the disk
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::CoreConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retries.attempt_timeout_ms must be greater than 0")]
    ZeroAttemptTimeout,

    #[error("logging.directory must not be empty")]
    EmptyLogDirectory,

    #[error("observability.log_level '{0}' is not a valid filter")]
    InvalidLogLevel(String),
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.retries.attempt_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroAttemptTimeout);
    }
    if config.logging.directory.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyLogDirectory);
    }

    let level = config.observability.log_level.trim();
    if level.is_empty() || tracing_subscriber::EnvFilter::try_new(level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CoreConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CoreConfig::default();
        config.retries.max_attempts = 0;
        config.retries.attempt_timeout_ms = Some(0);
        config.logging.directory = PathBuf::new();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroAttempts,
                ValidationError::ZeroAttemptTimeout,
                ValidationError::EmptyLogDirectory,
            ]
        );
    }

    #[test]
    fn test_blank_log_level_rejected() {
        let mut config = CoreConfig::default();
        config.observability.log_level = "  ".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidLogLevel(_)));
    }
}
