//! Exponential backoff for transient vendor-page fetch failures.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Transient failures worth another attempt: network errors, HTTP 429 and
/// server-side 5xx. Everything else (404, other 4xx, parse failures) is final.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(_) | ScraperError::RateLimited { .. } => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Delay before retry number `retry` (0-based): `base_ms * 2^retry`, saturating.
pub(crate) fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << retry.min(32)))
}

/// Runs `operation` until it succeeds, fails permanently, or `max_retries`
/// extra attempts have been spent. The last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut retry = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if retry >= max_retries || !is_retriable(&err) {
            return Err(err);
        }

        let delay = backoff_delay(backoff_base_ms, retry);
        tracing::debug!(
            retry,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient fetch failure, backing off"
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}
