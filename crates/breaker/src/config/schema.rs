//! Configuration schema definitions.
//!
//! All types derive Serde traits so a policy can live in a TOML or JSON file.
//! Durations are written in seconds.

use std::time::Duration;

use circuit_common::{duration_secs, option_duration_secs};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Policy handed to every breaker of a registry
    pub breaker: BreakerConfig,
    /// Subscriber settings for [`crate::logging::init`]
    pub logging: LoggingConfig,
}

impl CircuitConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.breaker.validate()
    }
}

/// Policy shared by all breakers of one registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures tolerated inside one `time_unit`; one more opens the circuit
    pub max_fail: u32,
    /// Base wait in the open state before a probe is let through
    #[serde(with = "duration_secs")]
    pub reset_timeout: Duration,
    /// Width of the sliding failure window
    #[serde(with = "duration_secs")]
    pub time_unit: Duration,
    /// Enables exponential backoff of the open wait, capped at this value
    #[serde(with = "option_duration_secs", skip_serializing_if = "Option::is_none")]
    pub backoff_cap: Option<Duration>,
    /// Scale the open wait by a uniform random factor in `[0, 1)`
    pub use_jitter: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_fail: 3,
            reset_timeout: Duration::from_secs(10),
            time_unit: Duration::from_secs(60),
            backoff_cap: None,
            use_jitter: true,
        }
    }
}

impl BreakerConfig {
    /// Start a builder from the defaults
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_fail == 0 {
            return Err(ConfigError::invalid("max_fail must be greater than 0"));
        }

        if self.time_unit.is_zero() {
            return Err(ConfigError::invalid("time_unit must be greater than 0"));
        }

        if self.backoff_cap.is_some_and(|cap| cap.is_zero()) {
            return Err(ConfigError::invalid("backoff_cap must be greater than 0 when set"));
        }

        Ok(())
    }
}

/// Builder for [`BreakerConfig`]
#[derive(Debug, Default)]
pub struct BreakerConfigBuilder {
    config: BreakerConfig,
}

impl BreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: BreakerConfig::default() }
    }

    pub fn max_fail(mut self, max_fail: u32) -> Self {
        self.config.max_fail = max_fail;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn time_unit(mut self, window: Duration) -> Self {
        self.config.time_unit = window;
        self
    }

    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.config.backoff_cap = Some(cap);
        self
    }

    pub fn no_backoff(mut self) -> Self {
        self.config.backoff_cap = None;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.use_jitter = enabled;
        self
    }

    pub fn build(self) -> ConfigResult<BreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`info`, `circuit_breaker=debug`, ...)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
