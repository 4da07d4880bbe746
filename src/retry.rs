//! Retry Helper
//!
//! Re-invokes a fallible async operation a fixed number of times with a
//! fixed sleep between attempts. No jitter, no backoff curve: the last
//! failure is returned once attempts run out.

use anyhow::{bail, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Default attempts for RPC reads
pub const DEFAULT_RETRY_COUNT: usize = 5;

/// Default sleep between RPC read attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Call `f` up to `retry_count` times, returning the first success or the
/// last error. A `retry_count` of zero fails without calling `f`.
pub async fn retry_call<T, F, Fut>(retry_count: usize, delay: Duration, f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_call_if(retry_count, delay, |_| true, f).await
}

/// Like [`retry_call`], but only failures accepted by `should_retry` are
/// retried; any other failure is returned immediately.
pub async fn retry_call_if<T, F, Fut, P>(
    retry_count: usize,
    delay: Duration,
    should_retry: P,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    if retry_count == 0 {
        bail!("retry_call: retry_count must be at least 1");
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= retry_count || !should_retry(&e) {
                    return Err(e);
                }
                warn!("Retry {}/{}: {:#}", attempt, retry_count, e);
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Operation that fails `failures` times, then returns the attempt number
    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> impl FnMut() -> futures::future::Ready<Result<usize>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                futures::future::ready(Err(anyhow!("failure {}", n)))
            } else {
                futures::future::ready(Ok(n))
            }
        }
    }

    #[tokio::test]
    async fn test_succeeds_iff_more_attempts_than_failures() {
        for k in 0..4usize {
            for n in 1..6usize {
                let calls = Arc::new(AtomicUsize::new(0));
                let result = retry_call(n, Duration::ZERO, flaky(k, calls.clone())).await;
                assert_eq!(result.is_ok(), n > k, "n={} k={}", n, k);
                assert_eq!(calls.load(Ordering::SeqCst), n.min(k + 1), "n={} k={}", n, k);
            }
        }
    }

    #[tokio::test]
    async fn test_always_failing_raises_last_error_after_n_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = retry_call(3, Duration::ZERO, flaky(usize::MAX, calls.clone()))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "failure 3");
    }

    #[tokio::test]
    async fn test_zero_attempts_fails_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = retry_call(0, Duration::ZERO, flaky(0, calls.clone())).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_early() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = retry_call_if(
            5,
            Duration::ZERO,
            |e| !e.to_string().contains("failure 2"),
            flaky(10, calls.clone()),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blocking_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let value = tokio_test::block_on(retry_call(2, Duration::ZERO, flaky(1, calls))).unwrap();
        assert_eq!(value, 2);
    }
}
