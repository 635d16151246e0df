//! Per-key circuit breakers for calls to remote services.
//!
//! A [`BreakerRegistry`] hands out one [`Breaker`] per interaction key. Each
//! breaker watches the classified failures of its calls and, once they come
//! in faster than the configured rate, opens the circuit and rejects calls
//! with [`CircuitOpenError`] for a while. After the wait it lets a probe
//! through; a successful probe closes the circuit again, a failed one
//! re-opens it with an exponentially growing wait when backoff is enabled.
//!
//! ```
//! use std::io;
//! use std::time::Duration;
//!
//! use circuit_breaker::{BreakerConfig, BreakerRegistry, CircuitError};
//!
//! let config = BreakerConfig::builder()
//!     .max_fail(2)
//!     .reset_timeout(Duration::from_secs(10))
//!     .time_unit(Duration::from_secs(60))
//!     .backoff_cap(Duration::from_secs(120))
//!     .jitter(false)
//!     .build()
//!     .unwrap();
//!
//! let registry = BreakerRegistry::new(config).unwrap();
//! registry.register_error::<io::Error>();
//!
//! for _ in 0..3 {
//!     let _ = registry.call("search", || Err::<(), _>(io::Error::other("timed out")));
//! }
//!
//! match registry.call("search", || Ok::<_, io::Error>("hit")) {
//!     Err(CircuitError::Open(open)) => assert_eq!(open.key, "search"),
//!     other => panic!("expected an open circuit, got {other:?}"),
//! }
//! ```
//!
//! # Modules
//! - [`breaker`]: the state machine
//! - [`guard`]: scoped acquisition and the `call`/`execute` wrappers
//! - [`registry`]: per-key breakers with shared policy and classifier
//! - [`classify`]: which errors count as failures
//! - [`config`]: policy schema and the env/file loader
//! - [`logging`]: default `tracing` subscriber setup

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod breaker;
pub mod classify;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod registry;

pub use breaker::{Breaker, BreakerParts, BreakerSnapshot, CircuitState, Outcome};
pub use circuit_common::{Clock, MockClock, SystemClock};
pub use classify::{ErrorClassifier, ErrorKind, SharedClassifier};
pub use config::{BreakerConfig, CircuitConfig, LoggingConfig};
pub use error::{CircuitError, CircuitOpenError, ConfigError, ConfigResult};
pub use guard::BreakerGuard;
pub use registry::{BreakerFactory, BreakerRegistry, BreakerRegistryBuilder, DefaultFactory};
