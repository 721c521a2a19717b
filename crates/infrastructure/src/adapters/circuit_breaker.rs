//! Circuit breaker pattern for external service calls
//!
//! Implements the circuit breaker pattern to prevent cascading failures
//! when external services are unavailable.
//!
//! # States
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Service is down, requests fail fast without calling the service
//! - **Half-Open**: The reset timeout elapsed; exactly one trial call is let
//!   through and decides whether the circuit closes or opens again
//!
//! # Example
//!
//! ```rust,ignore
//! use infrastructure::adapters::CircuitBreaker;
//!
//! let cb = CircuitBreaker::new("helpdesk-media");
//! let result = cb.call(|| async {
//!     helpdesk.upload(payload).await
//! }).await;
//! ```

use std::{fmt, time::Duration};

use application::ApplicationError;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait in Open before admitting a trial call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a custom configuration
    #[must_use]
    pub const fn custom(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
        }
    }
}

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Service is down, requests fail fast
    Open,
    /// Testing if the service has recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Error returned when the circuit is open
#[derive(Debug, Clone)]
pub struct CircuitOpenError {
    /// Name of the service
    pub service_name: String,
}

impl std::error::Error for CircuitOpenError {}

impl fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit breaker open for service '{}': service is temporarily unavailable",
            self.service_name
        )
    }
}

/// Internal state tracking
#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// A Half-Open trial call is running
    trial_in_flight: bool,
}

impl CircuitBreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// How a call was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Circuit breaker wrapper for external service calls
///
/// Wraps any async operation with circuit breaker protection,
/// preventing cascading failures when services are unavailable.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitBreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with default configuration
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Creates a new circuit breaker with custom configuration
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitBreakerState::closed()),
        }
    }

    /// Returns the name of this circuit breaker
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state of the circuit breaker
    ///
    /// An Open circuit whose reset timeout has elapsed reports Half-Open;
    /// the transition itself happens when the next call is admitted.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let state = self.state.read();
        match state.state {
            CircuitState::Open if self.reset_elapsed(&state) => CircuitState::HalfOpen,
            other => other,
        }
    }

    /// Returns true if the circuit is closed (normal operation)
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Returns true if the circuit is open (service unavailable)
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    fn reset_elapsed(&self, state: &CircuitBreakerState) -> bool {
        state
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= self.config.reset_timeout)
    }

    fn open_error(&self) -> CircuitOpenError {
        CircuitOpenError {
            service_name: self.name.clone(),
        }
    }

    /// Decide whether a call may proceed
    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut state = self.state.write();
        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open if self.reset_elapsed(&state) => {
                debug!(service = %self.name, "Circuit transitioning from Open to HalfOpen");
                state.state = CircuitState::HalfOpen;
                state.trial_in_flight = true;
                Ok(Admission::Trial)
            },
            CircuitState::HalfOpen if !state.trial_in_flight => {
                state.trial_in_flight = true;
                Ok(Admission::Trial)
            },
            CircuitState::Open | CircuitState::HalfOpen => Err(self.open_error()),
        }
    }

    /// Records a successful call
    fn on_success(&self) {
        let mut state = self.state.write();
        state.failure_count = 0;

        if state.state == CircuitState::HalfOpen {
            info!(service = %self.name, "Circuit transitioning from HalfOpen to Closed");
            *state = CircuitBreakerState::closed();
        }
    }

    /// Records a failed call
    fn on_failure(&self) {
        let mut state = self.state.write();

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        service = %self.name,
                        failures = state.failure_count,
                        "Circuit transitioning from Closed to Open"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    state.failure_count = 0;
                }
            },
            CircuitState::HalfOpen => {
                warn!(
                    service = %self.name,
                    "Circuit transitioning from HalfOpen to Open after failed trial"
                );
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.trial_in_flight = false;
            },
            CircuitState::Open => {},
        }
    }

    /// Calls an async operation through the circuit breaker
    ///
    /// If the circuit is open, returns `CircuitOpenError` immediately.
    /// Otherwise, executes the operation and tracks its success/failure.
    /// A trial call that is dropped before completing frees the trial slot
    /// for the next caller.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The circuit is open (`CircuitOpenError`)
    /// - The inner operation fails (the original error)
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        let admission = match self.admit() {
            Ok(admission) => admission,
            Err(e) => {
                warn!(service = %self.name, "Circuit breaker preventing call to service");
                return Err(CircuitBreakerError::CircuitOpen(e));
            },
        };

        debug!(service = %self.name, ?admission, "Calling service through circuit breaker");
        let mut guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let outcome = f().await;
        guard.armed = false;

        match outcome {
            Ok(result) => {
                debug!(service = %self.name, "Service call succeeded");
                self.on_success();
                Ok(result)
            },
            Err(e) => {
                warn!(service = %self.name, error = ?e, "Service call failed");
                self.on_failure();
                Err(CircuitBreakerError::ServiceError(e))
            },
        }
    }
}

/// Frees the Half-Open trial slot if the trial future is dropped
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.breaker.state.write();
            if state.state == CircuitState::HalfOpen {
                state.trial_in_flight = false;
            }
        }
    }
}

/// Error type for circuit breaker operations
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open, preventing the call
    CircuitOpen(CircuitOpenError),
    /// The underlying service returned an error
    ServiceError(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen(e) => write!(f, "{e}"),
            Self::ServiceError(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen(e) => Some(e),
            Self::ServiceError(e) => Some(e),
        }
    }
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if this is a circuit open error
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// Returns true if this is a service error
    #[must_use]
    pub const fn is_service_error(&self) -> bool {
        matches!(self, Self::ServiceError(_))
    }

    /// Converts the inner service error if present
    #[must_use]
    pub fn into_service_error(self) -> Option<E> {
        match self {
            Self::ServiceError(e) => Some(e),
            Self::CircuitOpen(_) => None,
        }
    }
}

impl From<CircuitBreakerError<ApplicationError>> for ApplicationError {
    fn from(err: CircuitBreakerError<ApplicationError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen(e) => Self::CircuitOpen(e.service_name),
            CircuitBreakerError::ServiceError(e) => e,
        }
    }
}
