//! Retry with exponential backoff
//!
//! Used by remote providers to ride out transient failures (throttling, 5xx,
//! connect errors, timeouts). The substitution engine itself never retries.
//!
//! # Example
//!
//! ```rust,ignore
//! use manifest_subst::util::{RetryConfig, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::default().with_max_retries(2));
//!
//! let value = policy.execute(|| async { fetch_secret("DB_PASS").await }).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::FetchError;
use crate::util::constants::DEFAULT_MAX_RETRIES;

/// How often and how patiently a provider retries
///
/// The delay doubles after every failed attempt, starting at `initial_delay`
/// and never exceeding `max_delay`, then `jitter` spreads it by up to that
/// fraction either way.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Single attempt
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Clamped to 0.0..=1.0
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

/// Runs fetches under a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Pause before retry number `attempt + 1`
    fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self
            .config
            .initial_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.config.max_delay);

        if self.config.jitter == 0.0 {
            return doubled;
        }
        let spread = rand::thread_rng().gen_range(-self.config.jitter..=self.config.jitter);
        doubled.mul_f64((1.0 + spread).max(0.0))
    }

    /// Execute an operation, retrying while it fails with a transient error
    ///
    /// Non-transient errors (auth, malformed response) are returned at once.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
