// --- File: crates/courier_common/src/delivery.rs ---
//! Delivery service: the retry/backoff wrapper placed around a provider adapter.
//!
//! Providers time out or reject transiently; the delivery service owns the
//! retry policy so every adapter stays a single straight-line request. A
//! provider timeout means "outcome unknown", yet the policy still retries it:
//! the accepted contract is at-least-once delivery with idempotency-friendly
//! status updates, not exactly-once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::CourierError;
use crate::services::{ChannelProvider, DispatchResult};

/// Retry policy for a delivery service.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given attempt (1-based): `base_delay * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.max_delay)
    }
}

/// Wraps one provider adapter with a retry/backoff policy.
///
/// Only [`CourierError::ExternalServiceError`] is retried; validation, state
/// and configuration errors fail immediately since they would fail the same
/// way on every attempt. Backoff sleeps block only the attempt chain they
/// belong to, never sibling deliveries.
pub struct DeliveryService<M> {
    provider: Arc<dyn ChannelProvider<M>>,
    policy: RetryPolicy,
}

impl<M> DeliveryService<M>
where
    M: Clone + Send + Sync,
{
    pub fn new(provider: Arc<dyn ChannelProvider<M>>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// The backend identity of the wrapped adapter.
    pub fn backend(&self) -> &'static str {
        self.provider.backend()
    }

    /// Dispatch a message, retrying transient provider failures.
    ///
    /// Returns the first successful [`DispatchResult`]. After the policy is
    /// exhausted the last provider error is returned, annotated with the
    /// attempt count.
    pub async fn send(&self, message: M) -> Result<DispatchResult, CourierError> {
        let max_retries = self.policy.max_retries.max(1);
        let mut attempt = 1u32;

        loop {
            match self.provider.send(message.clone()).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            backend = self.provider.backend(),
                            channel = %self.provider.channel(),
                            attempt,
                            "dispatch succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        backend = self.provider.backend(),
                        channel = %self.provider.channel(),
                        attempt,
                        error = %err,
                        "dispatch failed with non-retryable error"
                    );
                    return Err(err);
                }
                Err(err) if attempt >= max_retries => {
                    warn!(
                        backend = self.provider.backend(),
                        channel = %self.provider.channel(),
                        attempt,
                        max_retries,
                        error = %err,
                        "dispatch failed, retries exhausted"
                    );
                    return Err(annotate_attempts(err, attempt));
                }
                Err(err) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        backend = self.provider.backend(),
                        channel = %self.provider.channel(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "dispatch attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn annotate_attempts(err: CourierError, attempts: u32) -> CourierError {
    match err {
        CourierError::ExternalServiceError { provider, message } => {
            CourierError::ExternalServiceError {
                provider,
                message: format!("{message} (after {attempts} attempts)"),
            }
        }
        other => other,
    }
}
