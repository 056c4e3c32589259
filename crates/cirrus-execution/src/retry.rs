//! Bounded retry for transient external errors. Side-effectful tools are
//! never retried automatically — callers opt in per call site, they are
//! not wrapped here.

use std::future::Future;
use std::time::Duration;

use cirrus_error::CirrusError;
use tokio::time::sleep;

/// At most 2 attempts beyond the first.
pub const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: MAX_RETRIES, base_delay: Duration::from_millis(100) }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Runs `operation`, retrying with exponential backoff only while the
    /// error reports [`cirrus_error::ErrorKind::is_transient`] and
    /// retryable. A non-retryable error returns immediately.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, CirrusError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CirrusError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries && e.is_retryable() && e.kind().is_transient() => {
                    let backoff = self.base_delay * 2u32.pow(attempt);
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
