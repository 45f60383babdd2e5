use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::http::SourceError;

/// Upper bound on a server-provided `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bounded exponential backoff with jitter, applied to rate-limited calls only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff plus up to 50% random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let spread_ms = u64::try_from(backoff.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter_ms = if spread_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread_ms)
        };
        backoff + Duration::from_millis(jitter_ms)
    }
}

/// Result of one attempt at a rate-limited call.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    RateLimited { retry_after: Option<Duration> },
}

/// Run `op` until it completes, retrying rate-limited attempts per `policy`.
///
/// Errors from `op` are terminal. Both the call and the wait between attempts
/// abort with [`SourceError::Cancelled`] once `cancel` fires.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>, SourceError>>,
{
    for attempt in 0..=policy.max_retries {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            outcome = op() => outcome?,
        };

        let retry_after = match outcome {
            Attempt::Done(value) => return Ok(value),
            Attempt::RateLimited { retry_after } => retry_after,
        };

        if attempt == policy.max_retries {
            break;
        }

        let delay = retry_after
            .map(|d| d.min(MAX_RETRY_AFTER))
            .unwrap_or_else(|| policy.delay_for(attempt + 1));
        tracing::warn!(
            attempt = attempt + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "rate-limited, retrying after backoff"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Err(SourceError::RateLimitExhausted {
        attempts: policy.max_retries + 1,
    })
}
