//! Per-key circuit breaker state machine
//!
//! A [`Breaker`] guards calls to one remote interaction. It tracks the
//! instants of recent classified failures in a sliding window and opens the
//! circuit when more than `max_fail` of them land inside one `time_unit`.
//! While open, calls are rejected until the open wait has elapsed; the next
//! call is then let through as a probe (half-open). A successful probe closes
//! the circuit, a failed probe grows the open wait when backoff is enabled.
//!
//! | State    | `permit()`                                   | success            | failure                        |
//! |----------|----------------------------------------------|--------------------|--------------------------------|
//! | Closed   | allow                                        | no-op              | record, maybe open             |
//! | Open     | allow once the wait has elapsed (half-open)  | no-op              | record, maybe re-open          |
//! | HalfOpen | allow                                        | close, reset count | bump count, record, maybe open |
//!
//! All mutable state sits behind one mutex, so every operation is atomic per
//! breaker and a breaker can be shared freely as `Arc<Breaker<C>>`.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use circuit_common::{Clock, RingBuffer, SystemClock};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, error, info, Span};

use crate::classify::{ErrorClassifier, SharedClassifier};
use crate::config::BreakerConfig;
use crate::error::{CircuitOpenError, ConfigResult};

/// Upper bound for the half-open failure counter, and so for the backoff
/// exponent.
pub const MAX_HALF_OPEN_FAILURES: u32 = 16;

/// Stand-in for a zero elapsed time when logging the error rate, in seconds.
const ZERO_ELAPSED_EPSILON: f64 = 0.0001;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, letting a probe through
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// How a guarded operation ended, from the breaker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation succeeded
    Success,
    /// The operation failed with a classified error
    Failure,
    /// The operation failed with an error the breaker does not track
    Passthrough,
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    /// Failure instants currently held in the sliding window
    pub window_len: usize,
    /// Failed probes since the circuit last closed
    pub half_open_failures: u32,
    /// Last transition into the open state, or the creation instant
    pub last_state_change: Instant,
}

/// Everything a breaker is built from
///
/// Registries assemble this for each new key and hand it to their
/// [`BreakerFactory`](crate::registry::BreakerFactory).
pub struct BreakerParts<C: Clock = SystemClock> {
    pub key: String,
    pub config: Arc<BreakerConfig>,
    pub classifier: SharedClassifier,
    pub clock: Arc<C>,
    pub span: Span,
}

impl<C: Clock> fmt::Debug for BreakerParts<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerParts")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    errors: RingBuffer<Instant>,
    last_state_change: Instant,
    half_open_failures: u32,
}

/// A single circuit with breaker logic
pub struct Breaker<C: Clock = SystemClock> {
    key: String,
    config: Arc<BreakerConfig>,
    classifier: SharedClassifier,
    clock: Arc<C>,
    span: Span,
    inner: Mutex<BreakerInner>,
}

impl Breaker<SystemClock> {
    /// Create a standalone breaker on the system clock.
    ///
    /// The breaker starts with an empty classifier; see
    /// [`Breaker::from_parts`] to share one.
    ///
    /// # Errors
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn new(key: impl Into<String>, config: BreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(key, config, SystemClock)
    }
}

impl<C: Clock> Breaker<C> {
    /// Create a standalone breaker driven by `clock`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`](crate::ConfigError) if `config` is invalid.
    pub fn with_clock(
        key: impl Into<String>,
        config: BreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let key = key.into();
        let span = tracing::info_span!("breaker", key = %key);
        Ok(Self::from_parts(BreakerParts {
            key,
            config: Arc::new(config),
            classifier: ErrorClassifier::new().shared(),
            clock: Arc::new(clock),
            span,
        }))
    }

    /// Assemble a breaker from already validated parts
    pub fn from_parts(parts: BreakerParts<C>) -> Self {
        let BreakerParts { key, config, classifier, clock, span } = parts;
        let window = usize::try_from(config.max_fail).unwrap_or(usize::MAX).saturating_add(1);
        let inner = BreakerInner {
            state: CircuitState::Closed,
            errors: RingBuffer::new(window),
            last_state_change: clock.now(),
            half_open_failures: 0,
        };
        Self { key, config, classifier, clock, span, inner: Mutex::new(inner) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Handle to the classifier this breaker consults
    pub fn classifier(&self) -> &SharedClassifier {
        &self.classifier
    }

    /// Span every log line of this breaker is emitted under
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            window_len: inner.errors.len(),
            half_open_failures: inner.half_open_failures,
            last_state_change: inner.last_state_change,
        }
    }

    /// Check whether a call may proceed.
    ///
    /// Returns the state the call proceeds under. An open circuit whose wait
    /// has elapsed moves to half-open and lets the call through as a probe.
    ///
    /// # Errors
    /// Returns [`CircuitOpenError`] while the circuit is open.
    pub fn permit(&self) -> Result<CircuitState, CircuitOpenError> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(inner.state);
        }

        let delay = self.open_delay(inner.half_open_failures);
        let elapsed = self.clock.now().saturating_duration_since(inner.last_state_change);
        if elapsed < delay {
            let retry_in = delay - elapsed;
            debug!(parent: &self.span, ?retry_in, "circuit open, rejecting call");
            return Err(CircuitOpenError { key: self.key.clone(), retry_in });
        }

        inner.state = CircuitState::HalfOpen;
        debug!(parent: &self.span, "half-open, letting one through");
        Ok(CircuitState::HalfOpen)
    }

    /// Record a successful call. Closes a half-open circuit.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.half_open_failures = 0;
            info!(parent: &self.span, "closing circuit");
        }
    }

    /// Record a classified failure at the current instant.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_failures = (inner.half_open_failures + 1).min(MAX_HALF_OPEN_FAILURES);
        }

        inner.errors.push(now);
        if inner.errors.len() <= self.config.max_fail as usize {
            return;
        }

        let Some(oldest) = inner.errors.pop() else {
            return;
        };
        let elapsed = now.saturating_duration_since(oldest);
        if elapsed < self.config.time_unit {
            let secs = if elapsed.is_zero() { ZERO_ELAPSED_EPSILON } else { elapsed.as_secs_f64() };
            debug!(
                parent: &self.span,
                rate = f64::from(self.config.max_fail) / secs,
                "error rate per second"
            );
            self.open(&mut inner, now);
        }
    }

    /// Classify `err` and record it when it counts as a failure.
    ///
    /// Unclassified errors leave the breaker untouched.
    pub fn record_error(&self, err: &(dyn Error + 'static)) -> Outcome {
        if self.is_failure(err) {
            self.record_failure();
            Outcome::Failure
        } else {
            Outcome::Passthrough
        }
    }

    /// Apply an outcome reported by a wrapper
    pub fn record(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.record_success(),
            Outcome::Failure => self.record_failure(),
            Outcome::Passthrough => {}
        }
    }

    /// `true` if the shared classifier counts `err` as a failure
    pub fn is_failure(&self, err: &(dyn Error + 'static)) -> bool {
        self.classifier.read().classifies(err)
    }

    /// Open the circuit now, regardless of the failure window.
    ///
    /// The half-open failure counter is left as is, so the next wait follows
    /// the current backoff step.
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.open(&mut inner, now);
    }

    /// Return to a fresh closed state: empty window, zero backoff.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.half_open_failures = 0;
        inner.errors.clear();
        info!(parent: &self.span, "circuit manually reset");
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.last_state_change = now;
        error!(
            parent: &self.span,
            half_open_failures = inner.half_open_failures,
            "opening circuit"
        );
    }

    /// Wait before an open circuit lets a probe through
    fn open_delay(&self, half_open_failures: u32) -> Duration {
        let base = match self.config.backoff_cap {
            None => self.config.reset_timeout,
            Some(cap) => {
                let factor = 1_u32 << half_open_failures.min(MAX_HALF_OPEN_FAILURES);
                self.config.reset_timeout.saturating_mul(factor).min(cap)
            }
        };

        if !self.config.use_jitter {
            return base;
        }

        let factor: f64 = rand::thread_rng().gen();
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
    }
}

impl<C: Clock> fmt::Debug for Breaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Breaker")
            .field("key", &self.key)
            .field("state", &inner.state)
            .field("window_len", &inner.errors.len())
            .field("half_open_failures", &inner.half_open_failures)
            .finish_non_exhaustive()
    }
}
