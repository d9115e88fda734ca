//! Configuration loading from the process environment.

use std::env;

use thiserror::Error;

use crate::config::schema::{AppConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the HTTP listen port.
pub const HTTP_PORT: &str = "HTTP_PORT";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT: &str = "LOG_FORMAT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}='{value}' is invalid: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

impl AppConfig {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load and validate configuration using `lookup` to resolve variables.
    ///
    /// Unset and empty variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = var(HTTP_PORT) {
            config.http.port = raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: HTTP_PORT,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(raw) = var(LOG_FORMAT) {
            config.logging.format =
                raw.parse::<LogFormat>()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: LOG_FORMAT,
                        value: raw.clone(),
                        reason,
                    })?;
        }

        validate_config(&config)?;

        Ok(config)
    }
}
