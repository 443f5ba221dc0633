//! Bounded retry with exponential backoff.
//!
//! ```text
//! attempt 1 ── fail (retryable) ── sleep 1s ──▶ attempt 2 ── fail ── sleep 2s ──▶ attempt 3 ── fail ──▶ Err
//!            └ fail (other) ──▶ Err, no delay
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification hook: only transient, network-class errors return `true`.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n` (n >= 2): `min(base * 2^(n-2), max)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Longest time [`run`](Self::run) can take when every attempt is bounded
    /// by `per_attempt`: all attempts plus every backoff sleep.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        (2..=self.max_attempts).fold(
            per_attempt.saturating_mul(self.max_attempts),
            |total, n| total.saturating_add(self.delay_before(n)),
        )
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt ceiling is reached. The last error is always returned.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_before(attempt + 1);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::rstest;
    use tokio::time::Instant;

    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[rstest]
    #[case(2, Duration::from_secs(1))]
    #[case(3, Duration::from_secs(2))]
    #[case(4, Duration::from_secs(4))]
    #[case(9, Duration::from_secs(4))]
    fn backoff_schedule(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay_before(attempt), expected);
    }

    #[test]
    fn worst_case_counts_every_attempt_and_sleep() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.worst_case(Duration::from_secs(600)),
            Duration::from_secs(3 * 600 + 1 + 2)
        );
        let once = RetryPolicy {
            max_attempts: 1,
            ..policy
        };
        assert_eq!(once.worst_case(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn retryable_error_is_attempted_three_times() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();

        let result: Result<(), Flaky> = RetryPolicy::default()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff under paused time.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn non_retryable_error_fails_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();

        let result: Result<(), Flaky> = RetryPolicy::default()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn recovers_on_second_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<u32, Flaky> = RetryPolicy::default()
            .run("test", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(Flaky(true))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }
}
