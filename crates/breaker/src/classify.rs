//! Deciding which operation errors count against a breaker
//!
//! Only errors matched by a registered [`ErrorKind`] are recorded as
//! failures. Everything else passes through the breaker untouched, so a
//! validation error from the remote side cannot trip the circuit unless the
//! caller opts in.
//!
//! ```rust
//! use std::io;
//!
//! use circuit_breaker::classify::{ErrorClassifier, ErrorKind};
//!
//! fn timed_out(err: &(dyn std::error::Error + 'static)) -> bool {
//!     err.downcast_ref::<io::Error>().is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
//! }
//!
//! let mut classifier = ErrorClassifier::new();
//! classifier.register(ErrorKind::custom("io-timeout", timed_out));
//!
//! assert!(classifier.classifies(&io::Error::from(io::ErrorKind::TimedOut)));
//! assert!(!classifier.classifies(&io::Error::from(io::ErrorKind::NotFound)));
//! ```

use std::any::TypeId;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Matcher signature shared by every kind
pub type ErrorMatcher = fn(&(dyn Error + 'static)) -> bool;

/// Classifier handle shared between a registry and the breakers it creates.
///
/// Registering a kind through any clone is visible to all of them.
pub type SharedClassifier = Arc<RwLock<ErrorClassifier>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindId {
    Type(TypeId),
    Named(&'static str),
}

/// One class of errors that counts as a breaker failure
#[derive(Clone)]
pub struct ErrorKind {
    id: KindId,
    name: &'static str,
    matcher: ErrorMatcher,
}

fn is_type<E: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<E>()
}

impl ErrorKind {
    /// Matches errors whose concrete type is `E`.
    pub fn of<E: Error + 'static>() -> Self {
        Self {
            id: KindId::Type(TypeId::of::<E>()),
            name: std::any::type_name::<E>(),
            matcher: is_type::<E>,
        }
    }

    /// Matches errors accepted by `matcher`. Two custom kinds with the same
    /// name are treated as the same kind.
    pub fn custom(name: &'static str, matcher: ErrorMatcher) -> Self {
        Self { id: KindId::Named(name), name, matcher }
    }

    /// Human-readable name, used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `err` belongs to this kind
    pub fn matches(&self, err: &(dyn Error + 'static)) -> bool {
        (self.matcher)(err)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ErrorKind {}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorKind").field(&self.name).finish()
    }
}

/// Ordered, duplicate-free set of [`ErrorKind`]s
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    kinds: Vec<ErrorKind>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh classifier in a shareable handle
    pub fn shared(self) -> SharedClassifier {
        Arc::new(RwLock::new(self))
    }

    /// Add `kind`; returns `false` if it was already registered.
    pub fn register(&mut self, kind: ErrorKind) -> bool {
        if self.kinds.contains(&kind) {
            return false;
        }
        self.kinds.push(kind);
        true
    }

    /// Shorthand for `register(ErrorKind::of::<E>())`
    pub fn register_type<E: Error + 'static>(&mut self) -> bool {
        self.register(ErrorKind::of::<E>())
    }

    pub fn extend<I: IntoIterator<Item = ErrorKind>>(&mut self, kinds: I) {
        for kind in kinds {
            self.register(kind);
        }
    }

    /// `true` if any registered kind matches `err`
    pub fn classifies(&self, err: &(dyn Error + 'static)) -> bool {
        self.kinds.iter().any(|kind| kind.matches(err))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.kinds.iter().map(ErrorKind::name).collect()
    }
}

impl FromIterator<ErrorKind> for ErrorClassifier {
    fn from_iter<I: IntoIterator<Item = ErrorKind>>(iter: I) -> Self {
        let mut classifier = Self::new();
        classifier.extend(iter);
        classifier
    }
}
