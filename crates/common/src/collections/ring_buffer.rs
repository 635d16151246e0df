//! A fixed-capacity FIFO with overwrite-on-full and constant-time operations.
//!
//! A [`RingBuffer`] stores items in insertion order while keeping its length
//! bounded by the caller-provided capacity. When [`push`](RingBuffer::push)
//! receives a value while the buffer is full, the oldest element is discarded
//! first. Breakers use it as their sliding failure window: the capacity is
//! `max_fail + 1`, so the window can never grow past that bound even if a
//! caller forgets to pop.
//!
//! # Complexity
//! - `push`, `pop`, `oldest`, `newest`, `len`, `is_full` and `clear` (amortised)
//!   are **O(1)**.

use std::collections::VecDeque;

/// Largest number of slots reserved up front; bigger buffers grow on demand.
const PREALLOCATE_LIMIT: usize = 1024;

/// A fixed-capacity circular buffer storing elements in first-in-first-out
/// order.
///
/// # Examples
///
/// ```rust
/// use circuit_common::collections::RingBuffer;
///
/// let mut window = RingBuffer::new(3);
/// window.push(1);
/// window.push(2);
/// window.push(3);
/// window.push(4); // evicts the oldest item (`1`)
///
/// assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
/// assert_eq!(window.pop(), Some(2));
/// assert_eq!(window.oldest(), Some(&3));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new buffer with the provided capacity.
    ///
    /// A capacity of zero is clamped to `1`.
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT)), capacity }
    }

    /// Appends an item, evicting and returning the oldest one when full.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.buf.pop_front() } else { None };
        self.buf.push_back(item);
        evicted
    }

    /// Removes and returns the oldest item in the buffer.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// Oldest item still stored.
    #[inline]
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Most recently pushed item.
    #[inline]
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Returns the number of items currently stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when the buffer has no items.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns `true` when the buffer reached its capacity.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Returns the maximum number of items the buffer can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes all elements, leaving the capacity unchanged.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns an iterator visiting elements from oldest to newest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

impl<T> Default for RingBuffer<T> {
    #[inline]
    fn default() -> Self {
        Self::new(1)
    }
}
