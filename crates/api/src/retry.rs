//! Startup connection retries.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Runs `connect` up to `attempts` times, sleeping `delay` between failures.
///
/// Returns the first success or the last error. At least one attempt is made.
pub async fn connect_with_retry<T, E, F, Fut>(
    name: &str,
    attempts: u32,
    delay: Duration,
    mut connect: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(value) => {
                tracing::info!(target_service = name, attempt, "connected");
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    target_service = name,
                    attempt,
                    attempts,
                    error = %e,
                    "connection failed, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(target_service = name, attempts, error = %e, "giving up connecting");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);

        let result: Result<u32, String> =
            connect_with_retry("test", 5, Duration::from_millis(1), || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n} refused")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> =
            connect_with_retry("test", 2, Duration::from_millis(1), || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n} refused"))
            })
            .await;

        assert_eq!(result, Err("attempt 2 refused".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> =
            connect_with_retry("test", 0, Duration::from_millis(1), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("refused".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
