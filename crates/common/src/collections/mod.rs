//! Specialized data structures
//!
//! - **[`ring_buffer`]**: Fixed-size FIFO backing the breaker failure window

pub mod ring_buffer;

pub use ring_buffer::RingBuffer;
