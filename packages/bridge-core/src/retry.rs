//! Retry and error-classification utilities for RPC and submission paths.
//!
//! The chain client itself never retries; callers wrap operations in
//! [`with_retry`] and use [`classify_error`] to decide whether a failure is
//! worth another attempt.

use std::time::Duration;

use eyre::{eyre, Result};
use tracing::{debug, warn};

/// Retry configuration for chain submissions.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (not retries; 3 means up to 3 sends).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff for a 0-indexed attempt, capped at `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self
            .initial_backoff
            .as_millis()
            .saturating_mul(2u128.saturating_pow(attempt));
        Duration::from_millis(millis.min(self.max_backoff.as_millis()) as u64)
    }
}

/// Failure classes for chain RPC errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network trouble, timeouts, overloaded RPC. Retry.
    Transient,
    /// Replacement/underpriced gas. Retry; fee data is re-read per attempt.
    Underpriced,
    /// Nonce already consumed, usually by our own replaced transaction. Retry.
    NonceTooLow,
    /// Deterministic revert or malformed request. Do not retry.
    Terminal,
    /// Anything unrecognized. Retry with backoff.
    Unknown,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Terminal)
    }
}

/// Classify an error message for retry decisions.
pub fn classify_error(error: &str) -> ErrorClass {
    let error = error.to_lowercase();

    if error.contains("timeout")
        || error.contains("timed out")
        || error.contains("connection")
        || error.contains("reset")
        || error.contains("network")
        || error.contains("rate limit")
        || error.contains("too many requests")
        || error.contains("503")
        || error.contains("502")
        || error.contains("temporarily unavailable")
    {
        return ErrorClass::Transient;
    }

    if error.contains("underpriced")
        || error.contains("replacement transaction")
        || error.contains("gas price too low")
        || error.contains("max fee per gas less than")
    {
        return ErrorClass::Underpriced;
    }

    if error.contains("nonce too low") || error.contains("already known") {
        return ErrorClass::NonceTooLow;
    }

    if error.contains("reverted")
        || error.contains("execution reverted")
        || error.contains("invalid signature")
        || error.contains("insufficient funds")
        || error.contains("out of gas")
        || error.contains("invalid parameters")
        || error.contains("chain mismatch")
    {
        return ErrorClass::Terminal;
    }

    ErrorClass::Unknown
}

/// Run `operation` until it succeeds, a terminal error occurs, or attempts
/// run out. The attempt index is passed in so callers can re-derive
/// per-attempt state (fresh gas estimate, fresh fee data).
pub async fn with_retry<F, T, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let class = classify_error(&e.to_string());
                if !class.is_retryable() {
                    warn!(attempt, error = %e, ?class, "Terminal error, giving up");
                    return Err(e);
                }

                let backoff = config.backoff_for_attempt(attempt);
                if attempt + 1 < config.max_attempts {
                    debug!(
                        attempt,
                        ?class,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| eyre!("Operation failed after {} attempts", config.max_attempts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_growth_and_cap() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(24),
        };
        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.backoff_for_attempt(4), Duration::from_secs(16));
        assert_eq!(config.backoff_for_attempt(5), Duration::from_secs(24));
        assert_eq!(config.backoff_for_attempt(9), Duration::from_secs(24));
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_error("connection timeout"), ErrorClass::Transient);
        assert_eq!(classify_error("connection reset by peer"), ErrorClass::Transient);
        assert_eq!(
            classify_error("replacement transaction underpriced"),
            ErrorClass::Underpriced
        );
        assert_eq!(classify_error("nonce too low"), ErrorClass::NonceTooLow);
        assert_eq!(classify_error("execution reverted: no liquidity"), ErrorClass::Terminal);
        assert_eq!(classify_error("something odd"), ErrorClass::Unknown);
    }

    #[test]
    fn test_retryable_partition() {
        assert!(ErrorClass::Transient.is_retryable());
        assert!(ErrorClass::Underpriced.is_retryable());
        assert!(ErrorClass::NonceTooLow.is_retryable());
        assert!(ErrorClass::Unknown.is_retryable());
        assert!(!ErrorClass::Terminal.is_retryable());
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_transient() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&config, |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(eyre!("connection timeout"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_terminal() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(eyre!("execution reverted")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry after revert");
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(eyre!("nonce too low")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
