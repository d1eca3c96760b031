//! # Retry Executor
//! Wraps one upstream invocation for one channel: breaker gate first (no
//! retry consumed on fail-fast), then rate-window admission, then the
//! attempt itself bounded by the per-attempt timeout. Outcomes feed the
//! breaker; retryable failures back off exponentially with jitter.
//!
//! Cancellation safety: if the caller drops the future mid-attempt, nothing
//! is recorded for that attempt; an admitted half-open trial slot is
//! reclaimed by the breaker after its cooldown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use rand::Rng;

use crate::breaker::CircuitBreaker;
use crate::channel::{Channel, ChannelError};
use crate::config::ChannelPolicy;
use crate::ratelimit::RateWindow;

pub struct RetryExecutor {
    channel: Channel,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateWindow>,
    max_attempts: u32,
    backoff_base: Duration,
    attempt_timeout: Duration,
    wait_for_slot: bool,
}

impl RetryExecutor {
    pub fn from_policy(channel: Channel, policy: &ChannelPolicy) -> Self {
        Self {
            channel,
            breaker: Arc::new(CircuitBreaker::new(
                channel,
                policy.failure_threshold,
                policy.success_threshold,
                policy.cooldown(),
            )),
            limiter: Arc::new(RateWindow::new(
                channel,
                policy.rate_limit,
                policy.rate_window(),
            )),
            max_attempts: policy.max_attempts.max(1),
            backoff_base: Duration::from_millis(policy.backoff_base_ms),
            attempt_timeout: policy.attempt_timeout(),
            wait_for_slot: policy.wait_for_slot,
        }
    }

    /// Run `op` with bounded, backed-off retries. `op` is invoked once per
    /// attempt; every attempt re-checks the breaker first, so a breaker that
    /// opened mid-loop exits early without touching the upstream.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, ChannelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if !self.breaker.allow() {
                counter!("orchestrator_breaker_rejections_total", "channel" => self.channel.name())
                    .increment(1);
                return Err(ChannelError::CircuitOpen {
                    channel: self.channel,
                });
            }

            if self.wait_for_slot {
                self.limiter.acquire().await;
            } else if !self.limiter.try_acquire() {
                // The call never happens, so an admitted half-open trial
                // must be handed back rather than held until it goes stale.
                self.breaker.release_trial();
                counter!("orchestrator_rate_rejections_total", "channel" => self.channel.name())
                    .increment(1);
                return Err(ChannelError::RateLimited {
                    channel: self.channel,
                });
            }

            let err = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    if e.reached_upstream() {
                        self.breaker.record_failure();
                    }
                    e
                }
                Err(_elapsed) => {
                    self.breaker.record_failure();
                    ChannelError::timeout(self.channel)
                }
            };

            attempt += 1;
            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            counter!("orchestrator_retries_total", "channel" => self.channel.name()).increment(1);
            let backoff = self.backoff_delay(attempt);
            tracing::debug!(
                channel = %self.channel,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// `base * 2^attempt + jitter`, jitter uniform in `[0, base)`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.backoff_base.as_millis() as u64;
        let exp = base_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = if base_ms > 0 {
            rand::rng().random_range(0..base_ms)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn limiter(&self) -> &Arc<RateWindow> {
        &self.limiter
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}
