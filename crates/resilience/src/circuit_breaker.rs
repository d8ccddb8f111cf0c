//! Per-operation circuit breaker (C3).
//!
//! Closed -> Open on `failure_threshold` consecutive failures. Open rejects
//! immediately until `reset_timeout` elapses, then probes via HalfOpen.
//! HalfOpen -> Closed on the first success; any HalfOpen failure reopens
//! immediately.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub name: String,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 3,
            reset_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub opened_at_unix_ms: Option<u64>,
}

#[derive(Debug, Error)]
#[error("circuit '{name}' is open")]
pub struct CircuitBreakerOpenError {
    pub name: String,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    total_failures: u64,
    total_successes: u64,
    opened_at: Option<Instant>,
}

/// A single named circuit. Cheap to clone (`Arc` inside); the
/// `ResilienceEngine` holds one per operation kind.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<RwLock<Inner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(RwLock::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_failures: 0,
                total_successes: 0,
                opened_at: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether a call may currently be attempted. Transitions Open ->
    /// HalfOpen as a side effect once the reset timeout has elapsed.
    pub async fn allow_request(&self) -> bool {
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= Duration::from_millis(self.config.reset_timeout_ms))
                    .unwrap_or(false);
                if elapsed {
                    info!(circuit = %self.config.name, "transitioning open -> half_open");
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn on_success(&self) {
        let mut inner = self.inner.write().await;
        inner.total_successes += 1;
        inner.consecutive_failures = 0;
        match inner.state {
            CircuitState::HalfOpen => {
                info!(circuit = %self.config.name, "transitioning half_open -> closed");
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
            }
            CircuitState::Closed => {}
            CircuitState::Open => {}
        }
    }

    pub async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.total_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(circuit = %self.config.name, "transitioning closed -> open");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(circuit = %self.config.name, "probe failed, transitioning half_open -> open");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_failures = self.config.failure_threshold;
            }
            CircuitState::Open => {}
        }
    }

    /// Run `operation`, recording the outcome against this circuit.
    /// Returns `Err(CircuitBreakerOpenError)` without invoking `operation`
    /// if the circuit is open.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<Result<T, E>, CircuitBreakerOpenError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow_request().await {
            return Err(CircuitBreakerOpenError {
                name: self.config.name.clone(),
            });
        }
        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(Ok(value))
            }
            Err(err) => {
                self.on_failure().await;
                Ok(Err(err))
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read().await;
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            opened_at_unix_ms: None,
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub async fn force_open(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
    }
}
