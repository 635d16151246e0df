//! Common utility functions
//!
//! - **[`serde`]**: Serialization helpers for policy durations

pub mod serde;

pub use self::serde::{duration_secs, option_duration_secs, parse_secs};
