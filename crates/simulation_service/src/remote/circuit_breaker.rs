//! Circuit breaker guarding calls to one remote endpoint.

use crate::config::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitBreakerState {
    /// Calls go through
    Closed,
    /// Calls fail immediately
    Open,
    /// Trial calls go through to test recovery
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
    last_activity: Instant,
}

/// Tracks the health of a single remote endpoint.
///
/// Closed until `failure_threshold` consecutive failures, then open for
/// `open_duration`, then half-open until `success_threshold` trial calls
/// succeed. Any failure while half-open re-opens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(BreakerInner {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                trial_successes: 0,
                opened_at: None,
                last_activity: Instant::now(),
            }),
        }
    }

    /// Endpoint this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether a call may go through, moving open circuits whose
    /// cool-down has elapsed to half-open.
    pub async fn can_execute(&self) -> bool {
        let mut inner = self.inner.write().await;
        inner.last_activity = Instant::now();
        match inner.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.config.open_duration())
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitBreakerState::HalfOpen;
                    inner.trial_successes = 0;
                    tracing::info!("Circuit breaker '{}' transitioned to HALF-OPEN", self.name);
                }
                cooled_down
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        inner.last_activity = Instant::now();
        match inner.state {
            CircuitBreakerState::Closed => inner.consecutive_failures = 0,
            CircuitBreakerState::HalfOpen => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.success_threshold {
                    inner.state = CircuitBreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    tracing::info!("Circuit breaker '{}' transitioned to CLOSED", self.name);
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.last_activity = Instant::now();
        let trip = match inner.state {
            CircuitBreakerState::Closed => {
                inner.consecutive_failures += 1;
                inner.consecutive_failures >= self.config.failure_threshold
            }
            CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => false,
        };
        if trip {
            inner.state = CircuitBreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_successes = 0;
            tracing::warn!("Circuit breaker '{}' transitioned to OPEN", self.name);
        }
    }

    pub async fn state(&self) -> CircuitBreakerState {
        self.inner.read().await.state
    }

    /// Returns `true` if the circuit is closed and has seen no call for at
    /// least `idle`. A breaker that is busy right now is never idle.
    pub fn is_idle(&self, idle: Duration) -> bool {
        match self.inner.try_read() {
            Ok(inner) => {
                inner.state == CircuitBreakerState::Closed && inner.last_activity.elapsed() >= idle
            }
            Err(_) => false,
        }
    }

    /// Manually closes the circuit
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitBreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.trial_successes = 0;
        inner.opened_at = None;
    }
}
