//! Bounded retry with a fixed inter-attempt delay.
//!
//! Used by the feedback client only; the ledger and lifecycle stay free of
//! retry concerns.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
/// Returns the first success, or the last error once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    debug_assert!(attempts > 0);
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(attempt, attempts, error = %e, "attempt failed");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    // attempts >= 1, so last_err is set.
    Err(last_err.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn first_success_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(3, Duration::ZERO, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry(3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("boom".to_string())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("fail {n}")) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "fail 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
