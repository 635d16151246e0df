//! Configuration loading and management
//!
//! ```text
//! env vars / circuit.toml / circuit.json
//!     → loader.rs (parse & deserialize)
//!     → schema.rs validate()
//!     → BreakerConfig handed to a BreakerRegistry (shared via Arc)
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load, load_from_env, load_from_file, parse_config, probe_config_paths};
pub use schema::{BreakerConfig, BreakerConfigBuilder, CircuitConfig, LoggingConfig};
