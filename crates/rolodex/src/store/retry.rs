//! Exponential backoff for transient remote failures

use std::future::Future;
use std::time::Duration;

use rolodex_api::Result;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retrying idempotent remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one; 1 disables retries
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_backoff_ms: u64,
    /// Backoff multiplier (e.g., 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms as f64) as u64)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, runs out
    /// of attempts, or `keep_going` returns false.
    ///
    /// `keep_going` is checked before every retry so callers can stop once
    /// the result would be discarded anyway.
    pub async fn run<T, F, Fut, K>(&self, op_name: &str, mut op: F, keep_going: K) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        K: Fn() -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts && keep_going() => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "[RetryPolicy] {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        op_name, attempt, max_attempts, err, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
