//! Bounded readiness polling
//!
//! A single wait loop shared by every "is it there yet?" step. Backends
//! plug in through [`ReadinessCheck`]; the loop itself never knows whether
//! it is asking a CI host, a package index or a container registry.
//!
//! The loop checks immediately, then sleeps `interval` between checks until
//! the check reports ready, the check fails, the deadline passes, or the
//! run is cancelled. It is a readiness wait, not a retry mechanism: a check
//! error ends the wait at once.

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::execution::cancel::CancelSignal;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Capability of an external system that can answer "is it ready?"
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// Name of the awaited resource, used in timeout errors
    fn resource(&self) -> String;

    /// Check once. `Ok(false)` means "not yet".
    async fn check_ready(&self) -> ReleaseResult<bool>;
}

/// Timeout and poll interval for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitOptions {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub const fn from_secs(timeout_secs: u64, interval_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    /// Options from user-supplied seconds
    ///
    /// A zero interval would poll without pausing, and a timeout shorter
    /// than the interval never gets a second check.
    pub fn checked(timeout_secs: u64, interval_secs: u64) -> ReleaseResult<Self> {
        if interval_secs == 0 {
            return Err(ReleaseError::Validation(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if timeout_secs < interval_secs {
            return Err(ReleaseError::Validation(format!(
                "timeout ({}s) is shorter than the poll interval ({}s)",
                timeout_secs, interval_secs
            )));
        }
        Ok(Self::from_secs(timeout_secs, interval_secs))
    }

    /// Package and image availability: 5 minutes, every 5 seconds
    pub const fn artifact() -> Self {
        Self::from_secs(5 * 60, 5)
    }

    /// CI run completion: 30 minutes, every 15 seconds
    pub const fn ci() -> Self {
        Self::from_secs(30 * 60, 15)
    }
}

/// How a successful wait went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `check` until it is ready, it fails, `options.timeout` passes, or `cancel` fires
pub async fn wait_until_ready(
    check: &dyn ReadinessCheck,
    options: WaitOptions,
    cancel: &CancelSignal,
) -> ReleaseResult<PollSummary> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ReleaseError::Cancelled);
        }

        attempts += 1;
        let ready = tokio::select! {
            result = check.check_ready() => result?,
            _ = cancel.cancelled() => return Err(ReleaseError::Cancelled),
        };

        let elapsed = started.elapsed();
        if ready {
            debug!(
                "{} ready after {} checks ({:?})",
                check.resource(),
                attempts,
                elapsed
            );
            return Ok(PollSummary { attempts, elapsed });
        }

        if elapsed >= options.timeout {
            return Err(ReleaseError::Timeout {
                resource: check.resource(),
                elapsed,
            });
        }

        // Never sleep past the deadline, so the final check lands on it
        let pause = options.interval.min(options.timeout - elapsed);
        debug!(
            "{} not ready (check {}), next check in {:?}",
            check.resource(),
            attempts,
            pause
        );

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = cancel.cancelled() => return Err(ReleaseError::Cancelled),
        }
    }
}
