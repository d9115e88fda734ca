//! Configuration validation.
//!
//! Semantic checks that the environment parser cannot express. Every
//! violation is collected so a misconfigured deployment sees all of them at
//! once.

use thiserror::Error;

use crate::config::schema::{AppConfig, HttpConfig};

/// A single semantic configuration violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("http.read_timeout must be greater than zero")]
    ZeroReadTimeout,

    #[error("http.write_timeout must be greater than zero")]
    ZeroWriteTimeout,

    #[error("http.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("shutdown_grace must be greater than zero")]
    ZeroShutdownGrace,
}

/// Validate the whole application configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = http_errors(&config.http);
    if config.shutdown_grace.is_zero() {
        errors.push(ValidationError::ZeroShutdownGrace);
    }
    into_result(errors)
}

/// Validate only the HTTP server section.
pub fn validate_http(config: &HttpConfig) -> Result<(), Vec<ValidationError>> {
    into_result(http_errors(config))
}

fn http_errors(config: &HttpConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.read_timeout.is_zero() {
        errors.push(ValidationError::ZeroReadTimeout);
    }
    if config.write_timeout.is_zero() {
        errors.push(ValidationError::ZeroWriteTimeout);
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    errors
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
