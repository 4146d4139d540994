//! Error types for environment resolution
//!
//! Only a missing required variable is fatal. Everything else the resolver
//! touches degrades to a logged default instead of an error.

use thiserror::Error;

/// Configuration error raised while resolving the environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The environment variable {0} is missing. Please check docker image or Dockerfile!")]
    MissingConfiguration(String),
}

/// Result type alias for configuration resolution
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Name of the variable that caused the error
    pub fn variable(&self) -> &str {
        match self {
            ConfigError::MissingConfiguration(name) => name,
        }
    }
}
