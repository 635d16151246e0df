//! Scoped acquisition of a breaker
//!
//! [`Breaker::enter`] checks the circuit and hands back a [`BreakerGuard`]
//! that must be completed with the operation's outcome. [`Breaker::call`] and
//! [`Breaker::execute`] wrap the whole sequence for sync and async
//! operations.

use std::error::Error;
use std::future::Future;

use circuit_common::{Clock, SystemClock};
use tracing::{debug, Instrument};

use crate::breaker::{Breaker, CircuitState, Outcome};
use crate::error::{CircuitError, CircuitOpenError};

/// An admitted call in flight
///
/// Dropping the guard without reporting an outcome records nothing.
#[must_use = "report the outcome with `complete`, `succeed` or `fail`"]
#[derive(Debug)]
pub struct BreakerGuard<'a, C: Clock = SystemClock> {
    breaker: &'a Breaker<C>,
    admitted: CircuitState,
    finished: bool,
}

impl<'a, C: Clock> BreakerGuard<'a, C> {
    /// State the call was admitted under
    pub fn admitted_state(&self) -> CircuitState {
        self.admitted
    }

    /// `true` when this call is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.admitted == CircuitState::HalfOpen
    }

    /// Report the operation's result.
    ///
    /// `Ok` counts as a success; an `Err` is recorded only if classified.
    pub fn complete<T, E: Error + 'static>(self, result: &Result<T, E>) -> Outcome {
        match result {
            Ok(_) => self.succeed(),
            Err(err) => self.fail(err),
        }
    }

    pub fn succeed(mut self) -> Outcome {
        self.finished = true;
        self.breaker.record_success();
        Outcome::Success
    }

    pub fn fail<E: Error + 'static>(mut self, err: &E) -> Outcome {
        self.finished = true;
        self.breaker.record_error(err)
    }
}

impl<C: Clock> Drop for BreakerGuard<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                parent: self.breaker.span(),
                admitted = %self.admitted,
                "guard dropped without an outcome"
            );
        }
    }
}

impl<C: Clock> Breaker<C> {
    /// Check the circuit and start a guarded call.
    ///
    /// # Errors
    /// Returns [`CircuitOpenError`] while the circuit is open.
    pub fn enter(&self) -> Result<BreakerGuard<'_, C>, CircuitOpenError> {
        let admitted = self.permit()?;
        Ok(BreakerGuard { breaker: self, admitted, finished: false })
    }

    /// Run a synchronous operation behind the breaker.
    ///
    /// # Errors
    /// [`CircuitError::Open`] if the call was rejected, otherwise the
    /// operation's own error in [`CircuitError::Operation`].
    pub fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        let guard = self.enter()?;
        let result = operation();
        guard.complete(&result);
        result.map_err(CircuitError::Operation)
    }

    /// Run an async operation behind the breaker.
    ///
    /// The operation runs inside this breaker's span. No lock is held while
    /// it is awaited; if the future is dropped early nothing is recorded.
    ///
    /// # Errors
    /// [`CircuitError::Open`] if the call was rejected, otherwise the
    /// operation's own error in [`CircuitError::Operation`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let guard = self.enter()?;
        let result = operation().instrument(self.span().clone()).await;
        guard.complete(&result);
        result.map_err(CircuitError::Operation)
    }
}
