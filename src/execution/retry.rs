//! Exponential backoff for transient remote failures

use crate::core::error::{ReleaseError, ReleaseResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff schedule: `initial_backoff`, doubling each attempt, capped at `max_backoff`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op`, retrying while `is_recoverable` says the error is worth another try.
    ///
    /// Unrecoverable errors are returned at once. When every attempt fails
    /// with a recoverable error the result is [`ReleaseError::RetriesExhausted`].
    pub async fn run<T, F, Fut, P>(&self, label: &str, mut op: F, is_recoverable: P) -> ReleaseResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ReleaseResult<T>>,
        P: Fn(&ReleaseError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_recoverable(&err) {
                return Err(err);
            }
            if attempt >= max_attempts {
                if max_attempts == 1 {
                    return Err(err);
                }
                return Err(ReleaseError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff_for(attempt);
            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                label, attempt, max_attempts, err, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
