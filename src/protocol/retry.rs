//! RPC retry logic with exponential backoff

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum delay between retries
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Base delay for exponential backoff
const BASE_DELAY: Duration = Duration::from_millis(200);

/// Maximum number of retry attempts
const MAX_ATTEMPTS: usize = 3;

/// Retry policy for node calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom parameters
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy described by the `[node]` config section
    pub fn from_config(node: &NodeConfig) -> Self {
        Self::new(
            node.retry_attempts as usize,
            Duration::from_millis(node.retry_base_delay_ms),
            Duration::from_millis(node.retry_max_delay_ms),
        )
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Number of attempts made before giving up
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Operation succeeded on attempt {}", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if should_retry(&e) && attempt < self.max_attempts => {
                    warn!(
                        "Operation failed on attempt {}: {}. Retrying in {:?}...",
                        attempt, e, delay
                    );

                    // Add jitter to spread out retries
                    let jitter = delay.as_millis() as f64 * 0.1 * (rand::random::<f64>() - 0.5);
                    let actual_delay = delay + Duration::from_millis(jitter.abs() as u64);
                    tokio::time::sleep(actual_delay).await;

                    delay = std::cmp::min(delay * 2, self.max_delay);
                    attempt += 1;
                }
                Err(e) => {
                    if attempt == self.max_attempts && should_retry(&e) {
                        warn!("Operation failed after {} attempts: {}", attempt, e);
                    } else {
                        debug!("Non-retryable error: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Whether an error is transient and worth another attempt
pub fn should_retry(error: &Error) -> bool {
    match error {
        Error::Network(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        Error::Timeout(_) => true,
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
        ),
        Error::Other(msg) | Error::Protocol(msg) => {
            let lower = msg.to_lowercase();
            lower.contains("timeout")
                || lower.contains("connection")
                || lower.contains("server error")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504")
        }
        // node-side JSON-RPC errors and everything local are final
        Error::Rpc(_)
        | Error::Config(_)
        | Error::Json(_)
        | Error::Stratum(_)
        | Error::Validation(_)
        | Error::ChannelSend(_)
        | Error::Persistence(_)
        | Error::InvalidAddress(_) => false,
    }
}
