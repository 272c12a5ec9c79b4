//! Provider retry: repeats a request on transient failures.
//!
//! Wraps any provider and re-sends the same request on rate limits, network
//! failures and timeouts, doubling the wait each time. Authentication, API and
//! schema errors are returned immediately. The loop controller never retries;
//! this wrapper is the only place a request is repeated.

use async_trait::async_trait;
use autoloop_core::error::ProviderError;
use autoloop_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Upper bound on a single backoff wait.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A provider that retries transient failures of an inner provider.
pub struct RetryProvider {
    inner: Arc<dyn autoloop_core::Provider>,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryProvider {
    /// Wrap `inner`, trying each request at most `max_attempts` times.
    ///
    /// An attempt count of zero is treated as one.
    pub fn new(inner: Arc<dyn autoloop_core::Provider>, max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before attempt `attempt + 1`. Rate limits honour the server's
    /// hint when it is longer than the computed backoff.
    fn backoff(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(MAX_BACKOFF);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                exp.max(Duration::from_secs(*retry_after_secs).min(MAX_BACKOFF))
            }
            _ => exp,
        }
    }
}

#[async_trait]
impl autoloop_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderReply, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.send(request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let wait = self.backoff(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
