//! Keyed collection of breakers sharing one policy
//!
//! A [`BreakerRegistry`] creates a [`Breaker`] the first time a key is
//! asked for and returns the same instance on every later lookup. All of
//! its breakers share the registry's config, clock and error classifier;
//! registering an error kind on the registry is seen by breakers that
//! already exist.
//!
//! # Examples
//!
//! ```
//! use std::io;
//! use std::sync::Arc;
//!
//! use circuit_breaker::{BreakerConfig, BreakerRegistry};
//!
//! let registry = BreakerRegistry::new(BreakerConfig::default()).unwrap();
//! registry.register_error::<io::Error>();
//!
//! let a = registry.breaker_for("billing");
//! let b = registry.breaker_for("billing");
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! let result: Result<(), _> = registry.call("billing", || Err(io::Error::other("down")));
//! assert!(!result.unwrap_err().is_open());
//! assert_eq!(a.snapshot().window_len, 1);
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use circuit_common::{Clock, SystemClock};
use dashmap::DashMap;
use tracing::Span;

use crate::breaker::{Breaker, BreakerParts, BreakerSnapshot};
use crate::classify::{ErrorClassifier, ErrorKind, SharedClassifier};
use crate::config::BreakerConfig;
use crate::error::{CircuitError, ConfigResult};

/// Builds the breaker for a newly seen key.
///
/// Runs while the registry holds the map entry for that key, so it must not
/// call back into the same registry.
pub trait BreakerFactory<C: Clock = SystemClock>: Send + Sync {
    fn create(&self, parts: BreakerParts<C>) -> Breaker<C>;
}

/// Factory that builds a plain [`Breaker`] from its parts
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl<C: Clock> BreakerFactory<C> for DefaultFactory {
    fn create(&self, parts: BreakerParts<C>) -> Breaker<C> {
        Breaker::from_parts(parts)
    }
}

impl<C, F> BreakerFactory<C> for F
where
    C: Clock,
    F: Fn(BreakerParts<C>) -> Breaker<C> + Send + Sync,
{
    fn create(&self, parts: BreakerParts<C>) -> Breaker<C> {
        self(parts)
    }
}

/// Controller for a set of circuit breakers, one per key
pub struct BreakerRegistry<C: Clock = SystemClock> {
    breakers: DashMap<String, Arc<Breaker<C>>>,
    config: Arc<BreakerConfig>,
    classifier: SharedClassifier,
    factory: Arc<dyn BreakerFactory<C>>,
    clock: Arc<C>,
    span: Span,
}

impl BreakerRegistry<SystemClock> {
    /// Create a registry on the system clock.
    ///
    /// # Errors
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn new(config: BreakerConfig) -> ConfigResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> BreakerRegistryBuilder<SystemClock> {
        BreakerRegistryBuilder::new()
    }
}

impl<C: Clock> BreakerRegistry<C> {
    /// Create a registry driven by `clock`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn with_clock(config: BreakerConfig, clock: C) -> ConfigResult<Self> {
        BreakerRegistryBuilder::new().clock(clock).config(config).build()
    }

    /// Return the breaker for `key`, creating it on first use.
    pub fn breaker_for(&self, key: &str) -> Arc<Breaker<C>> {
        if let Some(existing) = self.breakers.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .breakers
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(self.factory.create(self.parts(key))));
        Arc::clone(entry.value())
    }

    /// The breaker for `key`, if one was created
    pub fn get(&self, key: &str) -> Option<Arc<Breaker<C>>> {
        self.breakers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Count `kind` as a failure in every breaker of this registry.
    ///
    /// Returns `false` if the kind was already registered.
    pub fn register_error_kind(&self, kind: ErrorKind) -> bool {
        let added = self.classifier.write().register(kind);
        if added {
            tracing::debug!(parent: &self.span, "registered error kind");
        }
        added
    }

    pub fn register_error_kinds<I: IntoIterator<Item = ErrorKind>>(&self, kinds: I) {
        self.classifier.write().extend(kinds);
    }

    /// Count errors of concrete type `E` as failures
    pub fn register_error<E: Error + 'static>(&self) -> bool {
        self.register_error_kind(ErrorKind::of::<E>())
    }

    /// Run `operation` behind the breaker for `key`.
    ///
    /// # Errors
    /// See [`Breaker::call`].
    pub fn call<F, T, E>(&self, key: &str, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        self.breaker_for(key).call(operation)
    }

    /// Run an async `operation` behind the breaker for `key`.
    ///
    /// # Errors
    /// See [`Breaker::execute`].
    pub async fn execute<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let breaker = self.breaker_for(key);
        breaker.execute(operation).await
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Keys with a breaker, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.breakers.iter().map(|entry| entry.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    /// Snapshot of every breaker, keyed by interaction key
    pub fn snapshot(&self) -> BTreeMap<String, BreakerSnapshot> {
        self.breakers.iter().map(|entry| (entry.key().clone(), entry.value().snapshot())).collect()
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &SharedClassifier {
        &self.classifier
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn parts(&self, key: &str) -> BreakerParts<C> {
        BreakerParts {
            key: key.to_owned(),
            config: Arc::clone(&self.config),
            classifier: Arc::clone(&self.classifier),
            clock: Arc::clone(&self.clock),
            span: tracing::info_span!(parent: &self.span, "breaker", key = %key),
        }
    }
}

impl<C: Clock> fmt::Debug for BreakerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("config", &self.config)
            .field("classifier", &*self.classifier.read())
            .field("breakers", &self.keys())
            .finish_non_exhaustive()
    }
}

/// Builder for [`BreakerRegistry`]
pub struct BreakerRegistryBuilder<C: Clock = SystemClock> {
    config: BreakerConfig,
    clock: C,
    factory: Option<Arc<dyn BreakerFactory<C>>>,
    span: Option<Span>,
    classifier: ErrorClassifier,
}

impl BreakerRegistryBuilder<SystemClock> {
    pub fn new() -> Self {
        Self {
            config: BreakerConfig::default(),
            clock: SystemClock,
            factory: None,
            span: None,
            classifier: ErrorClassifier::new(),
        }
    }

    /// Drive the registry from `clock`.
    ///
    /// Call before [`factory`](Self::factory); factories are tied to the
    /// clock type.
    pub fn clock<D: Clock>(self, clock: D) -> BreakerRegistryBuilder<D> {
        BreakerRegistryBuilder {
            config: self.config,
            clock,
            factory: None,
            span: self.span,
            classifier: self.classifier,
        }
    }
}

impl Default for BreakerRegistryBuilder<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> BreakerRegistryBuilder<C> {
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn factory(mut self, factory: impl BreakerFactory<C> + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Parent span for the per-key breaker spans
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn error_kind(mut self, kind: ErrorKind) -> Self {
        self.classifier.register(kind);
        self
    }

    pub fn error_kinds<I: IntoIterator<Item = ErrorKind>>(mut self, kinds: I) -> Self {
        self.classifier.extend(kinds);
        self
    }

    /// # Errors
    /// Returns a [`ConfigError`](crate::ConfigError) if the config is invalid.
    pub fn build(self) -> ConfigResult<BreakerRegistry<C>> {
        self.config.validate()?;
        Ok(BreakerRegistry {
            breakers: DashMap::new(),
            config: Arc::new(self.config),
            classifier: self.classifier.shared(),
            factory: self.factory.unwrap_or_else(|| Arc::new(DefaultFactory)),
            clock: Arc::new(self.clock),
            span: self.span.unwrap_or_else(|| tracing::info_span!("circuit")),
        })
    }
}

impl<C: Clock> fmt::Debug for BreakerRegistryBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistryBuilder")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .field("custom_factory", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use circuit_common::MockClock;

    use super::*;
    use crate::breaker::CircuitState;

    fn config() -> BreakerConfig {
        BreakerConfig::builder()
            .max_fail(2)
            .reset_timeout(Duration::from_secs(10))
            .time_unit(Duration::from_secs(60))
            .jitter(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_breaker_for_returns_same_instance() {
        let registry = BreakerRegistry::with_clock(config(), MockClock::new()).unwrap();
        let first = registry.breaker_for("x");
        let second = registry.breaker_for("x");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.key(), "x");
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = BreakerRegistry::with_clock(config(), MockClock::new()).unwrap();
        let x = registry.breaker_for("x");
        let y = registry.breaker_for("y");

        x.force_open();
        assert_eq!(x.state(), CircuitState::Open);
        assert_eq!(y.state(), CircuitState::Closed);
        assert_eq!(registry.keys(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = BreakerRegistry::new(config()).unwrap();
        assert!(registry.get("x").is_none());
        assert!(registry.is_empty());

        registry.breaker_for("x");
        assert!(registry.get("x").is_some());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let bad = BreakerConfig { time_unit: Duration::ZERO, ..config() };
        assert!(BreakerRegistry::new(bad).is_err());
    }

    #[test]
    fn test_custom_factory_receives_parts() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);

        let registry = BreakerRegistry::builder()
            .clock(MockClock::new())
            .config(config())
            .factory(move |parts: BreakerParts<MockClock>| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(parts.config.max_fail, 2);
                Breaker::from_parts(parts)
            })
            .build()
            .unwrap();

        registry.breaker_for("a");
        registry.breaker_for("a");
        registry.breaker_for("b");
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registered_kinds_are_shared() {
        let registry = BreakerRegistry::builder()
            .config(config())
            .error_kind(ErrorKind::of::<io::Error>())
            .build()
            .unwrap();

        assert!(!registry.register_error::<io::Error>(), "already registered by the builder");
        registry.register_error_kinds([ErrorKind::of::<std::fmt::Error>()]);
        assert_eq!(registry.classifier().read().len(), 2);

        let breaker = registry.breaker_for("x");
        assert!(breaker.is_failure(&std::fmt::Error));
    }

    #[test]
    fn test_call_routes_to_keyed_breaker() {
        let registry = BreakerRegistry::with_clock(config(), MockClock::new()).unwrap();
        registry.register_error::<io::Error>();

        for _ in 0..3 {
            let result: Result<(), _> = registry.call("x", || Err(io::Error::other("down")));
            assert!(result.is_err());
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["x"].state, CircuitState::Open);
        assert!(registry.call("x", || Ok::<_, io::Error>(())).unwrap_err().is_open());
        assert!(registry.call("y", || Ok::<_, io::Error>(())).is_ok());
    }
}
