//! Rate limiting and retry utilities for the storefront push client.
//!
//! Provides bounded backoff retry logic for transient HTTP errors such as
//! 429 Rate Limited responses, honoring the `Retry-After` signal when the
//! storefront provides one. Non-retriable errors (not-found, parse
//! failures, other 4xx) are propagated immediately without retrying.

use std::future::Future;
use std::time::Duration;

use crate::error::StorefrontError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`StorefrontError::RateLimited`] — HTTP 429; the storefront asked us to back off.
/// - [`StorefrontError::Http`] — network-level failure (connection reset, timeout, etc.).
///
/// Non-retriable errors (propagated immediately):
/// - [`StorefrontError::NotFound`] — the caller handles this with a create fallback.
/// - [`StorefrontError::UnexpectedStatus`] — non-retriable HTTP status (e.g., 403, 422).
/// - [`StorefrontError::Deserialize`] — response body does not parse; retrying won't fix it.
fn is_retriable(err: &StorefrontError) -> bool {
    matches!(
        err,
        StorefrontError::RateLimited { .. } | StorefrontError::Http(_)
    )
}

/// Executes `operation` with bounded backoff retries on transient errors.
///
/// The wait before retry `n` is `backoff_base_ms * 2^(n-1)`, capped at 30 s;
/// a 429 carrying a longer `Retry-After` overrides the computed delay.
/// Non-retriable errors are returned immediately without sleeping.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, StorefrontError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorefrontError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;

                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let retry_after_ms = match &err {
                    StorefrontError::RateLimited { retry_after_secs } => {
                        retry_after_secs.saturating_mul(1_000)
                    }
                    _ => 0,
                };
                let delay_ms = computed.max(retry_after_ms).min(MAX_DELAY_MS);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient storefront error — retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
