//! Circuit breaker guarding broker operations.
//!
//! While Iggy is unreachable every delivery would otherwise wait out its own
//! reconnection. Once `failure_threshold` consecutive connection failures
//! have been seen, the breaker opens and operations fail immediately with
//! `AppError::CircuitOpen` for `open_duration`. The producer turns those
//! into delivery failures after its retries, so the error counter keeps
//! moving during an outage.
//!
//! ```text
//!            failures ≥ threshold
//!   Closed ───────────────────────► Open
//!     ▲                              │ open_duration elapsed
//!     │ successes ≥ threshold        ▼
//!     └────────────────────────── HalfOpen ──failure──► Open
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast
    Open,
    /// Letting operations through to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Thresholds for [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again
    pub success_threshold: u32,
    /// Time spent open before letting operations through again
    pub open_duration: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, success_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            open_duration,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.circuit_breaker_failure_threshold,
            config.circuit_breaker_success_threshold,
            config.circuit_breaker_open_duration,
        )
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct BreakerState {
    state: CircuitState,
    opened_at: Option<Instant>,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

/// Thread-safe circuit breaker.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                opened_at: None,
                consecutive_failures: 0,
                consecutive_successes: 0,
            }),
        }
    }

    /// Whether an operation may proceed.
    ///
    /// An open circuit whose `open_duration` has elapsed moves to half-open
    /// and lets the caller through.
    pub async fn allow_request(&self) -> bool {
        {
            let inner = self.inner.read().await;
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    if inner
                        .opened_at
                        .is_some_and(|at| at.elapsed() < self.config.open_duration)
                    {
                        metrics::record_circuit_rejection();
                        return false;
                    }
                }
            }
        }

        let mut inner = self.inner.write().await;

        // Another task may have moved it already
        if inner.state != CircuitState::Open {
            return true;
        }
        if inner
            .opened_at
            .is_some_and(|at| at.elapsed() < self.config.open_duration)
        {
            metrics::record_circuit_rejection();
            return false;
        }

        inner.state = CircuitState::HalfOpen;
        inner.consecutive_successes = 0;
        info!("Circuit breaker half-open, retrying broker");
        true
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.consecutive_failures = 0;
                    info!("Circuit breaker closed, broker recovered");
                }
            }
            CircuitState::Open => debug!("Success recorded while circuit open"),
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                debug!(
                    consecutive_failures = inner.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker recorded failure"
                );
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    metrics::record_circuit_opened();
                    warn!(
                        failures = inner.consecutive_failures,
                        open_duration = ?self.config.open_duration,
                        "Circuit breaker opened, failing broker operations fast"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                metrics::record_circuit_opened();
                warn!("Circuit breaker reopened, broker still unavailable");
            }
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }
}
