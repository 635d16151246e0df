//! Error types surfaced by breakers, wrappers and configuration loading

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The circuit for `key` is open; no call was attempted.
///
/// `retry_in` is the remaining wait computed for this particular check. With
/// jitter enabled every check draws a fresh delay, so it is an estimate rather
/// than a promise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit `{key}` is open, retry in {retry_in:?}")]
pub struct CircuitOpenError {
    /// Interaction key of the rejecting breaker
    pub key: String,
    /// Time left before the breaker would let a probe through
    pub retry_in: Duration,
}

/// Result of running an operation through a breaker wrapper
///
/// Operation errors come back untouched in [`CircuitError::Operation`],
/// whether or not the breaker classified them as failures.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The breaker refused the call
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation ran and returned this error
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> CircuitError<E> {
    /// `true` if the call was rejected without running
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The operation's own error, if it ran
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Open(_) => None,
        }
    }

    /// Borrow the operation's own error, if it ran
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Open(_) => None,
        }
    }
}

/// Errors raised while validating or loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} format: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
