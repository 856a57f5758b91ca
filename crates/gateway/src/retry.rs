//! Bounded-backoff submission retry
//!
//! Only transient failures are retried; a broker rejection surfaces
//! immediately. Idempotent client order ids make retry-after-timeout
//! safe: if the first attempt actually landed, the resubmission is
//! deduplicated broker-side and we get the original ack back.

use crate::error::GatewayError;
use crate::gateway::ExecutionGateway;
use crate::messages::{OrderAck, SubmitRequest};
use log::warn;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff, capped: base * 2^attempt up to max
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_delay_ms);
        Duration::from_millis(exp)
    }
}

/// Submit with retry on transient errors.
///
/// Returns the first non-transient error unchanged, or the last
/// transient error once attempts are exhausted.
pub async fn submit_with_retry(
    gateway: &dyn ExecutionGateway,
    request: SubmitRequest,
    policy: RetryPolicy,
) -> Result<OrderAck, GatewayError> {
    let mut attempt = 0;
    loop {
        match gateway.submit(request.clone()).await {
            Ok(ack) => return Ok(ack),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay(attempt);
                warn!(
                    "[GATEWAY RETRY] {} attempt {}/{} failed ({e}), retrying in {:?}",
                    request.client_order_id,
                    attempt + 1,
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
