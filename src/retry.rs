//! Retry-with-backoff wrapper applied to read-only device operations.
//!
//! Mirrors the source implementation's `@retry(stop=stop_after_attempt(3),
//! wait=wait_exponential(multiplier=1, max=10))` decorator: up to three
//! attempts total, exponential backoff capped at ten seconds between
//! attempts. Write operations never go through this wrapper — a retried
//! write could double-apply a side effect on the device.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;

use crate::error::{FingerprintError, Result};

const MAX_ATTEMPTS: u32 = 3;

/// Run `op`, retrying on failure up to `MAX_ATTEMPTS` total attempts with
/// exponential backoff capped at ten seconds. The last error is returned
/// if every attempt fails.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(1))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(10));
                log::debug!(
                    "retrying after attempt {attempt}/{MAX_ATTEMPTS} failed: {err}; waiting {wait:?}"
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_three_attempts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FingerprintError::Offline("dev".into(), "timeout".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 1 {
                Err(FingerprintError::Offline("dev".into(), "blip".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
