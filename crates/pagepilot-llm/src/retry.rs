//! Bounded retry with exponential backoff for provider calls.
//!
//! One retry loop serves both failure classes the clients recover from:
//! transport errors (network failure, 5xx, rate limiting) and
//! schema-validation failures in structured-output mode, where re-querying
//! the model may yield output that does validate. Configuration errors,
//! auth rejections, and upstream proxy statuses are terminal.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{LlmError, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    pub max_retries: u32,
    /// Base delay between retries (default: 1 second).
    pub base_delay: Duration,
    /// Maximum delay between retries (default: 30 seconds).
    pub max_delay: Duration,
    /// Jitter factor: random 0..jitter_fraction of the delay is added (default: 0.25).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.25,
        }
    }
}

impl RetryConfig {
    /// Default config with an overridden retry budget, when one was passed
    /// in the client options.
    pub fn with_max_retries(max_retries: Option<u32>) -> Self {
        Self {
            max_retries: max_retries.unwrap_or(3),
            ..Self::default()
        }
    }
}

/// Determines whether an [`LlmError`] should be retried.
pub fn is_retryable(err: &LlmError) -> bool {
    match err {
        LlmError::RateLimited { .. } => true,
        LlmError::Http(_) => true,
        LlmError::InvalidResponseSchema(_) => true,
        LlmError::RequestFailed(msg) => {
            // Retry on 5xx server errors
            msg.starts_with("HTTP 500")
                || msg.starts_with("HTTP 502")
                || msg.starts_with("HTTP 503")
                || msg.starts_with("HTTP 504")
        }
        LlmError::UnsupportedModel(_)
        | LlmError::UnsupportedProvider(_)
        | LlmError::NotConfigured(_)
        | LlmError::AuthFailed(_)
        | LlmError::Upstream { .. }
        | LlmError::InvalidResponse(_)
        | LlmError::Json(_) => false,
    }
}

/// Calculate delay for attempt `n` (0-indexed) with exponential backoff + jitter.
///
/// The delay is `min(base_delay * 2^n, max_delay)` plus a random jitter of
/// `0..jitter_fraction * delay`.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let base_ms = config.base_delay.as_millis() as u64;
    let raw_ms = base_ms.saturating_mul(exp);
    let capped_ms = raw_ms.min(config.max_delay.as_millis() as u64);

    let jitter_max_ms = (capped_ms as f64 * config.jitter_fraction) as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        // Cheap pseudo-randomness from the clock's sub-second noise.
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        seed % (jitter_max_ms + 1)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// Run `op` up to `max_retries + 1` times, sleeping between attempts.
///
/// `op` receives the 0-indexed attempt number. Rate-limit errors honor the
/// provider-suggested delay when it exceeds the computed backoff. The last
/// error propagates unmodified once the budget is exhausted.
pub async fn run<T, F, Fut>(config: &RetryConfig, provider: &str, op: F) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(provider, attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) || attempt == config.max_retries {
                    return Err(err);
                }

                let delay = if let LlmError::RateLimited { retry_after_ms } = &err {
                    let computed = compute_delay(config, attempt);
                    let suggested = Duration::from_millis(*retry_after_ms);
                    computed.max(suggested)
                } else {
                    compute_delay(config, attempt)
                };

                warn!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after recoverable error"
                );

                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(LlmError::RequestFailed(
        "retry loop exhausted without error".into(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_fraction: 0.0,
        }
    }

    #[test]
    fn default_config() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert!((cfg.jitter_fraction - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn with_max_retries_override() {
        assert_eq!(RetryConfig::with_max_retries(Some(7)).max_retries, 7);
        assert_eq!(RetryConfig::with_max_retries(None).max_retries, 3);
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&LlmError::RateLimited { retry_after_ms: 1 }));
        assert!(is_retryable(&LlmError::InvalidResponseSchema("bad".into())));
        assert!(is_retryable(&LlmError::RequestFailed("HTTP 503: out".into())));
        assert!(is_retryable(&LlmError::RequestFailed("HTTP 500: err".into())));

        assert!(!is_retryable(&LlmError::RequestFailed("HTTP 400: bad".into())));
        assert!(!is_retryable(&LlmError::AuthFailed("nope".into())));
        assert!(!is_retryable(&LlmError::NotConfigured("missing".into())));
        assert!(!is_retryable(&LlmError::UnsupportedModel("x".into())));
        assert!(!is_retryable(&LlmError::Upstream {
            status: 502,
            body: String::new(),
        }));
        assert!(!is_retryable(&LlmError::InvalidResponse("garbage".into())));
    }

    #[test]
    fn delay_is_exponential() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.0,
        };
        assert_eq!(compute_delay(&config, 0).as_millis(), 100);
        assert_eq!(compute_delay(&config, 1).as_millis(), 200);
        assert_eq!(compute_delay(&config, 2).as_millis(), 400);
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter_fraction: 0.0,
        };
        assert_eq!(compute_delay(&config, 5).as_millis(), 5000);
    }

    #[test]
    fn jitter_stays_bounded() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.25,
        };
        for _ in 0..20 {
            let ms = compute_delay(&config, 0).as_millis();
            assert!(ms >= 1000, "delay {ms} < 1000");
            assert!(ms <= 1250, "delay {ms} > 1250");
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result = run(&fast_config(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, LlmError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        // Fails the first 2 calls, succeeds on the 3rd.
        let calls = AtomicU32::new(0);
        let result = run(&fast_config(3), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::RequestFailed("HTTP 503: unavailable".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run(&fast_config(2), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::InvalidResponseSchema("still invalid".into())) }
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponseSchema(_)));
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run(&fast_config(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::AuthFailed("bad key".into())) }
        })
        .await;
        assert!(matches!(result.unwrap_err(), LlmError::AuthFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_uses_suggested_delay() {
        let calls = AtomicU32::new(0);
        let result = run(&fast_config(3), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::RateLimited { retry_after_ms: 5 })
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "ok");
    }
}
