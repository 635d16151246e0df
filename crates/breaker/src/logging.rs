//! Subscriber setup for binaries and test harnesses embedding the breakers
//!
//! Breakers only emit `tracing` events; installing a subscriber is left to
//! the application. [`init`] is the stock setup: an `EnvFilter` seeded from
//! [`LoggingConfig::level`] (overridden by `RUST_LOG`) and a fmt layer
//! writing to stderr, as JSON lines when [`LoggingConfig::json`] is set.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ConfigError, ConfigResult};

/// Install the global subscriber.
///
/// # Errors
/// Returns [`ConfigError::Invalid`] if the level directive does not parse or
/// a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => env_filter(&config.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    };

    installed
        .map_err(|e| ConfigError::invalid(format!("Failed to install tracing subscriber: {e}")))
}

/// Parse a filter directive such as `info` or `circuit_breaker=debug,warn`
///
/// # Errors
/// Returns [`ConfigError::Invalid`] for malformed directives.
pub fn env_filter(directive: &str) -> ConfigResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| ConfigError::invalid(format!("Invalid log level `{directive}`: {e}")))
}
