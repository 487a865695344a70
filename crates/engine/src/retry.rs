//! Backoff for transient capture failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::{BackendError, OrchestratorConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRetry {
    /// Attempts after the first one.
    pub retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f32,
    pub max_backoff: Duration,
    /// Adds ±10% to each delay.
    pub jitter: bool,
}

impl Default for CaptureRetry {
    fn default() -> Self {
        Self {
            retries: 0,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl CaptureRetry {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            retries: config.capture_retries,
            initial_backoff: config.capture_backoff,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_ms = self.initial_backoff.as_millis() as f32 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_backoff.as_millis() as f32);

        let final_ms = if self.jitter {
            capped_ms * rand::rng().random_range(0.9..=1.1)
        } else {
            capped_ms
        };
        Duration::from_millis(final_ms.max(0.0) as u64)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error or
/// runs out of retries. Returns the last error.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &CaptureRetry,
    operation_name: &str,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                let delay = policy.backoff_duration(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    retries = policy.retries,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(retries: u32) -> CaptureRetry {
        CaptureRetry {
            retries,
            initial_backoff: Duration::from_millis(100),
            jitter: false,
            ..CaptureRetry::default()
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = CaptureRetry {
            max_backoff: Duration::from_millis(350),
            ..no_jitter(5)
        };
        assert_eq!(policy.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = CaptureRetry {
            jitter: true,
            ..no_jitter(1)
        };
        for _ in 0..50 {
            let ms = policy.backoff_duration(0).as_millis();
            assert!((90..=110).contains(&ms), "{ms}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(&no_jitter(2), "capture", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BackendError::Unreachable("flaky".into()))
            } else {
                Ok("secret")
            }
        })
        .await;
        assert_eq!(result, Ok("secret"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_run_out() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(&no_jitter(1), "capture", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Unreachable("down".into()))
        })
        .await;
        assert_eq!(result, Err(BackendError::Unreachable("down".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(&no_jitter(3), "capture", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Rejected("bad password".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
