//! Timeout and exponential-backoff retry around an [`HttpClient`].
//!
//! This is the only place retry policy lives. Callers build an
//! [`HttpRequest`] and hand it to [`ResilientClient::execute`]; they never loop
//! on network errors themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::NetworkError;
use crate::traits::{HttpClient, HttpRequest, Response};

/// Retry configuration for outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Bound on a single attempt.
    pub attempt_timeout: Duration,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the zero-based `attempt` failed: `min(base * 2^attempt, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Sum of all backoff delays when every attempt fails.
    pub fn worst_case_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.attempt_timeout.is_zero() {
            return Err("attempt_timeout must be positive".to_string());
        }
        if self.base_delay > self.max_delay {
            return Err("base_delay must not exceed max_delay".to_string());
        }
        Ok(())
    }
}

/// Book-keeping for one logical call under the retry policy. Never persisted.
#[derive(Debug, Clone)]
pub struct RetryableRequest {
    pub id: Uuid,
    /// "METHOD path" of the request.
    pub target: String,
    /// Attempts made so far.
    pub attempt: u32,
    pub attempt_timeout: Duration,
    pub cumulative_backoff: Duration,
}

impl RetryableRequest {
    fn new(request: &HttpRequest, policy: &RetryPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: request.describe(),
            attempt: 0,
            attempt_timeout: policy.attempt_timeout,
            cumulative_backoff: Duration::ZERO,
        }
    }
}

/// HTTP client decorator that masks transient transport failures.
///
/// Each attempt runs under its own cancellation token, cancelled by a timer
/// after `attempt_timeout`, so one slow attempt cannot eat into the next.
/// Responses are returned on first delivery whatever their status.
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<dyn HttpClient>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl ResilientClient {
    pub fn new(inner: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `shutdown` as the parent of every attempt token. Cancelling it
    /// aborts in-flight attempts and suppresses further retries.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transport failures per the policy.
    ///
    /// # Returns
    /// The first delivered response, or the last transport error once
    /// `max_attempts` attempts have failed.
    pub async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        let mut call = RetryableRequest::new(request, &self.policy);

        loop {
            let result = self.attempt(request).await;
            call.attempt += 1;

            let err = match result {
                Ok(response) => {
                    debug!(
                        request_id = %call.id,
                        endpoint = %call.target,
                        attempt = call.attempt,
                        status = response.status,
                        "Request delivered"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            if self.shutdown.is_cancelled() {
                return Err(NetworkError::Cancelled);
            }

            if !err.is_retryable() || !request.idempotent {
                debug!(
                    request_id = %call.id,
                    endpoint = %call.target,
                    error = %err,
                    "Request failed without retry"
                );
                return Err(err);
            }

            if call.attempt >= self.policy.max_attempts {
                error!(
                    request_id = %call.id,
                    endpoint = %call.target,
                    attempts = call.attempt,
                    backoff_ms = call.cumulative_backoff.as_millis() as u64,
                    error = %err,
                    "Request failed after exhausting retries"
                );
                return Err(err);
            }

            let delay = self.policy.delay_for(call.attempt - 1);
            call.cumulative_backoff += delay;
            warn!(
                request_id = %call.id,
                endpoint = %call.target,
                attempt = call.attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying request"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return Err(NetworkError::Cancelled),
            }
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        let token = self.shutdown.child_token();
        let timeout = self.policy.attempt_timeout;

        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            }
        });

        let result = tokio::select! {
            result = self.inner.execute(request) => result,
            _ = token.cancelled() => {
                if self.shutdown.is_cancelled() {
                    Err(NetworkError::Cancelled)
                } else {
                    Err(NetworkError::Timeout {
                        operation: request.describe(),
                        duration_secs: timeout.as_secs(),
                    })
                }
            }
        };

        timer.abort();
        result
    }
}
