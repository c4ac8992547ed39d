//! Retry logic for external extraction calls
//!
//! Exponential backoff for transient failures (timeouts, backend errors). Permanent
//! failures (parse errors, unavailable source) return immediately.

use crate::types::ExtractionError;
use std::time::{Duration, Instant};

/// Backoff settings for one retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

/// Retry an operation with exponential backoff while it fails transiently
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. On success, return the result
/// 3. On a transient error with retries left: log WARN, back off, retry
/// 4. On a permanent error or exhausted retries: return the last error
///
/// Backoff doubles after each attempt, capped at `max_backoff_ms`.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ExtractionError>>,
{
    let start_time = Instant::now();
    let mut attempt = 0u32;
    let mut backoff_ms = policy.initial_backoff_ms;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying extraction call");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Extraction call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                if attempt > policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Extraction call failed: retries exhausted"
                    );
                    return Err(err);
                }

                let next_backoff_ms = backoff_ms.min(policy.max_backoff_ms);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = next_backoff_ms,
                    error = %err,
                    "Transient extraction failure, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(next_backoff_ms)).await;

                backoff_ms = backoff_ms.saturating_mul(2).min(policy.max_backoff_ms);
            }
        }
    }
}
