//! Retry utilities for resilient operations
//!
//! Feed listings are re-polled with a short fixed pause, article pages back off
//! linearly, and everything else defaults to exponential backoff. All three
//! strategies share one [`RetryConfig`] and one retry loop.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How the pause between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// `base * attempt`
    Linear,
    /// `base * multiplier^(attempt - 1)`
    #[default]
    Exponential,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (the first attempt is not counted)
    pub max_retries: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps backoff growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,

    /// Upper bound of a uniform random delay added to every pause
    #[serde(default)]
    pub jitter_ms: u64,

    /// Backoff strategy
    #[serde(default)]
    pub strategy: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_ms: 0,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            ..Default::default()
        }
    }

    /// Fixed pause between attempts, used when re-polling feed listings
    pub fn fixed(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            strategy: BackoffStrategy::Fixed,
            ..Default::default()
        }
    }

    /// Linearly growing pause, used for article pages that drop connections
    pub fn linear(max_retries: u32, step_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: step_ms,
            max_delay_ms,
            strategy: BackoffStrategy::Linear,
            ..Default::default()
        }
    }

    /// Add random jitter to every pause
    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Delay before the given attempt, without jitter
    pub(crate) fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Exponential => {
                let exponential =
                    self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
                exponential as u64
            }
        };

        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Delay before the given attempt, including jitter
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.calculate_delay(attempt);
        if attempt == 0 || self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
        base + Duration::from_millis(jitter)
    }
}

/// Execute an operation with retry logic
///
/// Returns `Ok(T)` on the first success, or the last error once all retries
/// are exhausted.
///
/// # Example
///
/// ```no_run
/// use feedmill::utils::retry::{with_retry, RetryConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RetryConfig::fixed(10, 1000);
/// let value = with_retry(&config, || async { Ok::<_, anyhow::Error>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_if(config, operation, |_| true).await
}

/// Execute an operation with retry logic, using a custom retry predicate
///
/// Errors for which `should_retry` returns `false` are returned immediately.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    warn!(error = %e, "Non-retryable error encountered");
                    return Err(e);
                }

                if attempt >= config.max_retries {
                    warn!(
                        attempts = attempt + 1,
                        error = %e,
                        "Operation failed, retries exhausted"
                    );
                    return Err(e);
                }

                warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "Operation failed, will retry"
                );
            }
        }

        attempt += 1;
    }
}
