//! Bounded navigation retry.
//!
//! Attempt 1 runs immediately. After failed attempt `n` the caller sleeps
//! `min(n * step, max_delay)` before attempt `n + 1`. The last error is
//! surfaced once `max_attempts` is exhausted.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ScrapeError, ScrapeResult};

/// Retry schedule for page navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay added per failed attempt.
    pub step: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// The sleep after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. The final failure becomes a
/// [`ScrapeError::Navigation`] for `url`.
pub async fn retry_navigation<T, E, F, Fut>(
    policy: &RetryPolicy,
    portal_url: &str,
    url: &str,
    mut op: F,
) -> ScrapeResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(url, attempt, "navigation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    url,
                    attempt,
                    max_attempts = attempts,
                    error = %last_error,
                    "navigation attempt failed"
                );
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(ScrapeError::Navigation {
        portal_url: portal_url.to_string(),
        url: url.to_string(),
        attempts,
        message: last_error,
    })
}
