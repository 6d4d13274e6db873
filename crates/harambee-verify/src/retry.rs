// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry for store writes that must not be lost.

use std::future::Future;
use std::time::Duration;

use harambee_core::HarambeeError;
use tracing::warn;

/// Tries per write before giving up.
pub(crate) const WRITE_ATTEMPTS: u32 = 6;
const FIRST_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// Runs `write` until it succeeds, fails with a non-transient error, or
/// [`WRITE_ATTEMPTS`] tries are used up. The backoff doubles from 250ms
/// up to 4s, so a write gives up after less than eight seconds.
pub(crate) async fn with_retry<T, F, Fut>(
    op: &'static str,
    reference: &str,
    mut write: F,
) -> Result<T, HarambeeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HarambeeError>>,
{
    let mut backoff = FIRST_BACKOFF;
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < WRITE_ATTEMPTS => {
                warn!(op, reference, attempt, error = %e, "store write failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", "DON-1", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HarambeeError::PoolExhausted { size: 1 })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("op", "DON-1", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HarambeeError::InvalidStatus("bogus".into()))
        })
        .await;
        assert!(matches!(result, Err(HarambeeError::InvalidStatus(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = with_retry("op", "DON-1", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HarambeeError::PoolExhausted { size: 1 })
        })
        .await;
        assert!(matches!(result, Err(HarambeeError::PoolExhausted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), WRITE_ATTEMPTS);
        // 250 + 500 + 1000 + 2000 + 4000 ms
        assert_eq!(started.elapsed(), Duration::from_millis(7750));
    }
}
