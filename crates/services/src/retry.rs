//! Bounded retry for persistence writes.

use std::env;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 200;

/// How many times a write is tried and how long to wait in between.
///
/// The delay doubles after every failed try, starting at `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ATTEMPTS,
            Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one try.
    #[must_use]
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// A single try with no waiting.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Reads `PREP_RETRY_ATTEMPTS` and `PREP_RETRY_BASE_MS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let attempts = env::var("PREP_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_ATTEMPTS);
        let base_ms = env::var("PREP_RETRY_BASE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_BASE_DELAY_MS);
        Self::new(attempts, Duration::from_millis(base_ms))
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Wait before try number `retry` (1 for the first retry).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the error of the last try once every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut tried = 0;
        loop {
            tried += 1;
            match op().await {
                Ok(value) => {
                    debug!(operation, tried, "write persisted");
                    return Ok(value);
                }
                Err(err) if tried < self.attempts => {
                    let delay = self.delay_for(tried);
                    warn!(
                        operation,
                        tried,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(operation, tried, error = %err, "write failed, giving up");
                    return Err(err);
                }
            }
        }
    }
}

/// Whether a background write reached storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    /// Nothing needed writing.
    Skipped,
    /// Retry budget spent; local state and storage may disagree.
    Failed { reason: String },
}

impl SyncStatus {
    #[must_use]
    pub fn failed(reason: impl Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
