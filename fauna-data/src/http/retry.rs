//! Bounded retry with linearly growing delays.

use std::future::Future;
use std::time::Duration;

use fauna_core::ProviderError;
use tokio::time::sleep;

/// Number of attempts made by [`RetryPolicy::default`].
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay used by [`RetryPolicy::default`].
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// How often, and how patiently, a failing call is retried.
///
/// After failed attempt `n` the policy sleeps `base_delay * n` before trying
/// again. Only errors reporting [`ProviderError::is_retryable`] are retried;
/// nothing sleeps after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number between attempts.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit bounds.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Policy performing a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay slept after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts. `operation` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error when every attempt failed, or the first
    /// non-retryable error.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    log::warn!(
                        "{label} failed on attempt {attempt}/{max_attempts}: {err}; retrying in {delay:?}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
