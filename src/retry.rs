// src/retry.rs
//! Bounded exponential backoff around platform calls.
//!
//! Only `PlatformError::is_retryable()` errors are retried; everything else
//! (auth, 4xx, decode) is returned on the first failure.

use metrics::counter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::platform::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for Backoff {
    fn from(c: RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base: Duration::from_millis(c.base_delay_ms),
            max: Duration::from_millis(c.max_delay_ms),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << shift).min(self.max)
    }

    fn jittered(&self, attempt: u32, err: &PlatformError) -> Duration {
        let d = self.delay_for(attempt);
        let jitter_ms = (d.as_millis() as u64) / 4;
        let d = if jitter_ms > 0 {
            d + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            d
        };
        match err.retry_after() {
            Some(ra) if ra > d => ra,
            _ => d,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
pub async fn retry<T, F, Fut>(what: &str, backoff: &Backoff, mut op: F) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < backoff.max_attempts => {
                let delay = backoff.jittered(attempt, &e);
                warn!(
                    target: "retry",
                    op = what,
                    attempt,
                    max_attempts = backoff.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient platform failure, retrying"
                );
                counter!("bot_platform_retries_total").increment(1);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
