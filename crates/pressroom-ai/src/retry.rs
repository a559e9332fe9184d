//! Retry with exponential back-off and jitter for provider calls.
//!
//! [`retry_with_backoff`] wraps any fallible async generation call and
//! retries on transient errors (network failures, 5xx, rate limits).
//! Credential and parse errors are returned immediately; retrying
//! cannot fix them, and the runner's attempt ceiling handles the rest.

use std::future::Future;
use std::time::Duration;

use crate::error::AiError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses: transient server/infrastructure errors.
/// - Rate limits: the provider asked us to slow down, not stop.
///
/// **Not retriable (hard stop):**
/// - [`AiError::MissingApiKey`]: misconfiguration; no retry will help.
/// - [`AiError::Deserialize`]: malformed output; same prompt, same result.
/// - [`AiError::Api`] with a 4xx status: application-level rejection.
pub(crate) fn is_retriable(err: &AiError) -> bool {
    match err {
        AiError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        AiError::RateLimited(_) => true,
        AiError::Api { status, .. } => *status >= 500,
        AiError::MissingApiKey(_)
        | AiError::Unavailable(_)
        | AiError::AllProvidersFailed(_)
        | AiError::Deserialize { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Delay doubles per attempt from `backoff_base_ms`, with ±25 % jitter,
/// capped at 60 s. Non-retriable errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
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
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "provider transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
