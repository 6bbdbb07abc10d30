//! Configuration loading errors

use std::path::PathBuf;

use authlane_domain::AuthError;
use thiserror::Error;

use crate::errors::InfraError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} format: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for InfraError {
    fn from(err: ConfigError) -> Self {
        Self(AuthError::Config(err.to_string()))
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        InfraError::from(err).into()
    }
}
