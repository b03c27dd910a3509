//! Per-row retry with exponential backoff for transient provider failures.
//!
//! Only rate limits, timeouts, network errors and 5xx faults are retried.
//! A rate limit that carries `Retry-After` waits at least that long.

use std::future::Future;
use std::time::Duration;

use super::cancellation::CancellationToken;
use crate::ProviderError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls per row, first attempt included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// One call, never retried
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Exponential backoff delay after failed attempt `attempt` (1-based)
    ///
    /// With the default base: 500ms, 1s, 2s, 4s, ... capped at `max_delay`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next attempt, honouring a provider supplied hint
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.backoff_delay(attempt);
        match error.retry_after() {
            Some(hint) => hint.max(backoff).min(self.max_delay),
            None => backoff,
        }
    }

    fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        error.is_retryable() && attempt < self.max_attempts.max(1)
    }
}

/// Final state of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Done { value: T, attempts: u32 },
    Failed { error: ProviderError, attempts: u32 },
    /// Cancellation arrived while waiting to retry
    Cancelled { attempts: u32 },
}

/// Run `operation` until it succeeds, fails permanently, runs out of attempts
/// or the token is cancelled during a backoff wait.
///
/// `operation` receives the 1-based attempt number. `on_retry` is told the
/// number of the upcoming attempt and how long we will wait for it.
pub async fn call_with_retry<F, Fut, T, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: R,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, ProviderError>>,
    R: FnMut(u32, Duration, &ProviderError),
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return RetryOutcome::Done { value, attempts: attempt },
            Err(e) if policy.should_retry(attempt, &e) => {
                let delay = policy.delay_for(attempt, &e);
                tracing::debug!(
                    error = %e,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient provider error, retrying"
                );
                on_retry(attempt + 1, delay, &e);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                }
                if cancel.is_cancelled() {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                attempt += 1;
            }
            Err(e) => return RetryOutcome::Failed { error: e, attempts: attempt },
        }
    }
}
