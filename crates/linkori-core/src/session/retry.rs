use std::time::Duration;

use tracing::{debug, warn};

use crate::api::{ApiError, AuthClient};

/// Total refresh attempts (1 initial + 3 retries).
const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// First backoff delay; each following delay doubles.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

/// Bounded exponential backoff for the refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1.
    /// None once the attempt cap is reached.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_backoff.saturating_mul(factor))
    }

    /// Sum of every delay in a fully exhausted sequence.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .filter_map(|attempt| self.delay_after(attempt))
            .sum()
    }
}

/// Why a refresh sequence gave up.
#[derive(Debug)]
pub enum RefreshFailure {
    /// The server rejected the refresh session outright.
    Terminal(ApiError),
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: ApiError },
}

/// Call `refresh` until it succeeds, fails terminally, or runs out of
/// attempts. Sleeps only between retryable failures.
pub async fn refresh_with_retry<C: AuthClient>(
    client: &C,
    policy: &RetryPolicy,
) -> Result<String, RefreshFailure> {
    let mut attempt = 1;

    loop {
        match client.refresh().await {
            Ok(token) => {
                debug!(attempt = attempt, "Refresh succeeded");
                return Ok(token);
            }
            Err(e) if e.is_terminal() => {
                warn!(attempt = attempt, error = %e, "Refresh rejected, not retrying");
                return Err(RefreshFailure::Terminal(e));
            }
            Err(e) => match policy.delay_after(attempt) {
                Some(backoff) => {
                    warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Refresh failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                None => {
                    warn!(attempts = attempt, error = %e, "Refresh attempts exhausted");
                    return Err(RefreshFailure::Exhausted { attempts: attempt, last: e });
                }
            },
        }
    }
}
