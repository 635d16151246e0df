//! Foundation utilities shared by the circuit crates.
//!
//! Nothing in here knows about breaker semantics:
//! - [`clock`]: monotonic time source with a controllable test double
//! - [`collections`]: the bounded FIFO used for failure windows
//! - [`utils`]: serde helpers for policy durations expressed in seconds

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod clock;
pub mod collections;
pub mod utils;

pub use clock::{Clock, MockClock, SystemClock};
pub use collections::RingBuffer;
pub use utils::serde::{duration_secs, option_duration_secs};
