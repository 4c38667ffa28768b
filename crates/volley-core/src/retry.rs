//! Fixed-count retry with exponential backoff for engine calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How often and how patiently a failed engine call is retried.
///
/// Only errors that report [`is_retryable`](crate::error::VolleyError::is_retryable)
/// are retried. A server-provided `Retry-After` wins over the computed backoff,
/// but no wait exceeds `max_backoff_ms` plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first one. `0` means fail fast.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Upper bound on any single wait, server-requested or computed.
    fn max_delay(&self) -> Duration {
        // Jitter may add a quarter on top of a capped backoff.
        Duration::from_millis(self.max_backoff_ms.saturating_add(self.max_backoff_ms / 4))
    }

    fn jittered(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let spread = (base.as_millis() as u64) / 4;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.jittered(retry))
                        .min(self.max_delay());
                    tracing::warn!(
                        operation = label,
                        retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after engine failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VolleyError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(60), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let value = policy
            .run("test", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(VolleyError::engine_unavailable("refused"))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };

        let err = policy
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(VolleyError::engine_unavailable("down"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, VolleyError::EngineUnavailable { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_retry_after_is_capped() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 1,
            initial_backoff_ms: 100,
            max_backoff_ms: 8_000,
        };

        let started = tokio::time::Instant::now();
        let value = policy
            .run("test", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(VolleyError::EngineError {
                        status: Some(503),
                        message: "overloaded".into(),
                        retryable: true,
                        retry_after_ms: Some(86_400_000),
                    })
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert!(started.elapsed() <= Duration::from_millis(10_000));
        assert!(started.elapsed() >= Duration::from_millis(8_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_retry_after_is_honoured() {
        let attempts = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        RetryPolicy::default()
            .run("test", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(VolleyError::EngineError {
                        status: Some(429),
                        message: "slow down".into(),
                        retryable: true,
                        retry_after_ms: Some(3_000),
                    })
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let attempts = AtomicU32::new(0);

        let err = RetryPolicy::default()
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(VolleyError::ShapeMismatch {
                    expected: 2,
                    actual: 1,
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_shape_mismatch());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
