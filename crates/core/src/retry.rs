//! Retry with exponential backoff and jitter
//!
//! Transfer port implementations wrap each store call in
//! [`retry_with_backoff`]. Once the attempts are exhausted the last error is
//! returned unchanged; callers of the port never retry on their own.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry a fallible async operation with exponential backoff
///
/// `operation` names the call in log output.
///
/// # Example
/// ```ignore
/// let head = retry_with_backoff(
///     &config,
///     "head_object",
///     || async { client.head(&location).await },
///     is_retryable_error,
/// ).await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    operation: &str,
    mut attempt_fn: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    if attempt > 1 {
                        tracing::warn!(operation, attempts = attempt, error = %e, "Giving up");
                    }
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt);
                tracing::debug!(
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Backoff for the given 1-based attempt: `initial * 2^(attempt-1)`, capped,
/// plus up to the same amount of jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(10);
    let base_ms = config.initial_backoff_ms.saturating_mul(1u64 << shift);
    let capped_ms = base_ms.min(config.max_backoff_ms);

    Duration::from_millis(capped_ms + jitter(capped_ms))
}

/// Pseudo-random jitter in `[0, max)` from the clock's sub-second nanos
fn jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Whether an error is transient and worth another attempt
///
/// Store errors are classified when they are raised, so only
/// `Error::Unavailable` is retried; message text is never inspected.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Unavailable(_) => true,
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        Error::Transfer(_)
        | Error::MalformedLocation(_)
        | Error::LocalResource(_)
        | Error::NotFound(_)
        | Error::InvalidConfig(_)
        | Error::Config(_)
        | Error::General(_) => false,
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
