//! Retry strategy (C2): exponential backoff with jitter, gated by
//! [`ErrorKind::retryable`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::error_kind::{classify, ErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_exponential_backoff: bool,
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            use_exponential_backoff: true,
            use_jitter: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay_ms: u64,
    pub last_error_kind: Option<ErrorKind>,
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("max attempts ({0}) exceeded")]
    MaxAttemptsExceeded(u32),
    #[error("retry aborted: error kind {0} is not retryable")]
    NotRetryable(ErrorKind),
}

/// Result of a retried operation, surfaced explicitly rather than via
/// exceptions: callers inspect `.success` and `.attempts` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryOutcome<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error_kind: Option<ErrorKind>,
    pub attempts: u32,
    pub stats: RetryStats,
}

/// Calculate the delay before the `attempt`-th retry (1-indexed).
pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = if config.use_exponential_backoff {
        config.initial_delay_ms as f64 * config.backoff_multiplier.powi(attempt as i32 - 1)
    } else {
        config.initial_delay_ms as f64
    };
    let capped = base.min(config.max_delay_ms as f64);
    let with_jitter = if config.use_jitter {
        capped * rand::thread_rng().gen_range(0.5..=1.5)
    } else {
        capped
    };
    Duration::from_millis(with_jitter.round() as u64)
}

/// Run `operation` under `config`, retrying while the produced error
/// classifies as retryable, up to `max_attempts`. `operation` returns a
/// `Result<T, String>` so it can be used with any fallible async closure
/// without forcing callers onto `anyhow`/`thiserror`. If `cancellation`
/// fires while waiting out a backoff delay, the sleep is aborted and the
/// outcome reports `ErrorKind::Cancelled` without taking another attempt.
pub async fn retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    cancellation: Option<&CancellationToken>,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut stats = RetryStats::default();
    for attempt in 1..=config.max_attempts {
        stats.attempts = attempt;
        match operation().await {
            Ok(value) => {
                return RetryOutcome {
                    success: true,
                    value: Some(value),
                    error_kind: None,
                    attempts: attempt,
                    stats,
                };
            }
            Err(message) => {
                let kind = classify(&message);
                stats.last_error_kind = Some(kind);
                debug!(attempt, %kind, %message, "operation failed");

                if !kind.retryable() || attempt == config.max_attempts {
                    warn!(attempt, %kind, "giving up");
                    return RetryOutcome {
                        success: false,
                        value: None,
                        error_kind: Some(kind),
                        attempts: attempt,
                        stats,
                    };
                }

                let mut delay = calculate_delay(config, attempt);
                if let Some(hint) = kind.base_wait_hint() {
                    delay = delay.max(hint);
                }
                stats.total_delay_ms += delay.as_millis() as u64;

                if let Some(token) = cancellation {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => {
                            warn!(attempt, "retry sleep cancelled");
                            return RetryOutcome {
                                success: false,
                                value: None,
                                error_kind: Some(ErrorKind::Cancelled),
                                attempts: attempt,
                                stats,
                            };
                        }
                    }
                } else {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    // Unreachable when max_attempts >= 1, kept for exhaustiveness.
    RetryOutcome {
        success: false,
        value: None,
        error_kind: Some(ErrorKind::Internal),
        attempts: config.max_attempts,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let config = RetryConfig {
            use_jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_delay(&config, 1).as_millis(), 1000);
        assert_eq!(calculate_delay(&config, 2).as_millis(), 2000);
        assert_eq!(calculate_delay(&config, 3).as_millis(), 4000);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let config = RetryConfig {
            use_jitter: false,
            initial_delay_ms: 10_000,
            max_delay_ms: 15_000,
            backoff_multiplier: 3.0,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_delay(&config, 3).as_millis(), 15_000);
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_a_half() {
        let config = RetryConfig::default();
        for attempt in 1..=3 {
            let delay = calculate_delay(&config, attempt).as_millis() as f64;
            let base = 1000.0 * 2.0_f64.powi(attempt as i32 - 1);
            assert!(delay >= base * 0.5 - 1.0 && delay <= base * 1.5 + 1.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 10,
            ..RetryConfig::default()
        };
        let c = calls.clone();
        let outcome = retry(
            &config,
            || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("connection refused".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            None,
        )
        .await;
        assert!(outcome.success);
        assert_eq!(outcome.value, Some(42));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = RetryConfig::default();
        let c = calls.clone();
        let outcome: RetryOutcome<()> = retry(
            &config,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("401 unauthorized".to_string())
                }
            },
            None,
        )
        .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Authentication));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_max_attempts_on_persistent_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 10,
            ..RetryConfig::default()
        };
        let c = calls.clone();
        let outcome: RetryOutcome<()> = retry(
            &config,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("503 unavailable".to_string())
                }
            },
            None,
        )
        .await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_aborts_retry_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 60_000,
            ..RetryConfig::default()
        };
        let token = CancellationToken::new();
        let c = calls.clone();
        let cancel_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_token.cancel();
        });

        let started = std::time::Instant::now();
        let outcome: RetryOutcome<()> = retry(
            &config,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("network timeout".to_string())
                }
            },
            Some(&token),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
