//! Caller-side retry of transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{ErrorClass, StorageResult};

/// Runs `operation`, retrying failures classified as
/// [`ErrorClass::Transient`] with exponential backoff.
///
/// A backend-provided `retry_after` delay takes precedence over the
/// computed delay when it is longer. Any other error class is returned
/// immediately.
pub async fn retry_transient<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match f().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation, attempts, "Operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) => {
                if e.class() != ErrorClass::Transient || attempts > config.max_retries {
                    return Err(e);
                }

                let wait = e.retry_after().map_or(delay, |after| after.max(delay));
                warn!(
                    operation,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = wait.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );

                sleep(wait).await;
                delay = next_delay(config, delay);
            }
        }
    }
}

/// Grows `delay` by the backoff multiplier, capped at `max_delay`.
///
/// A multiplier that yields no valid duration (negative, NaN or overflowing)
/// jumps straight to `max_delay`.
fn next_delay(config: &RetryConfig, delay: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_delay, |next| next.min(config.max_delay))
}
