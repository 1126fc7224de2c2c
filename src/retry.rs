//! Exponential backoff for calls to flaky external services.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Attempt limit and base delay for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        with_retry(operation, self.max_attempts, self.base_delay).await
    }
}

/// Delay before attempt `attempt + 1`: `base * 2^(attempt - 1)` plus a
/// uniform jitter in `[0, base)`.
pub fn backoff_delay(base_delay: Duration, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    let backoff = base_delay.saturating_mul(1u32 << exponent);

    let base_ms = base_delay.as_millis() as u64;
    let jitter_ms = if base_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..base_ms)
    };

    backoff.saturating_add(Duration::from_millis(jitter_ms))
}

/// Run `operation` up to `max_attempts` times (at least once), sleeping with
/// exponential backoff between failures. The last error is returned
/// unchanged once all attempts fail.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    max_attempts: usize,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                log::warn!(
                    "retry: attempt {} of {} failed, giving up: {}",
                    attempt,
                    max_attempts,
                    err
                );
                return Err(err);
            }
            Err(err) => {
                let delay = backoff_delay(base_delay, attempt);
                log::warn!(
                    "retry: attempt {} of {} failed: {}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    err,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<&str, String> = with_retry(
            move || async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(format!("failure {call}"))
                } else {
                    Ok("generated")
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result, Ok("generated"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_attempts() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), String> = with_retry(
            move || async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {call}"))
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), &str> = RetryPolicy::new(0, Duration::from_millis(1))
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        let base = Duration::from_millis(100);
        for (attempt, floor) in [(1, 100), (2, 200), (3, 400)] {
            let delay = backoff_delay(base, attempt);
            assert!(delay >= Duration::from_millis(floor), "{delay:?}");
            assert!(delay < Duration::from_millis(floor + 100), "{delay:?}");
        }
        assert_eq!(backoff_delay(Duration::ZERO, 4), Duration::ZERO);
    }
}
