//! Error types for release operations

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the release pipeline and its collaborators
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Invalid or conflicting input, reported before any step runs
    #[error("{0}")]
    Validation(String),

    /// A tag, package or image that should exist does not
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limiting, server-side failures or network timeouts
    #[error("transient error: {0}")]
    Transient(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ReleaseError>,
    },

    /// A wait step's deadline elapsed
    #[error("timed out waiting for {resource} after {}s", elapsed.as_secs())]
    Timeout { resource: String, elapsed: Duration },

    #[error("cancelled")]
    Cancelled,

    /// Any other failure from an external collaborator
    #[error("{0}")]
    Failure(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Whether a retry policy should try the operation again
    pub fn is_transient(&self) -> bool {
        matches!(self, ReleaseError::Transient(_))
    }

    /// Classify a non-success HTTP status from a remote API
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            404 => ReleaseError::NotFound(context.to_string()),
            429 | 500..=599 => {
                ReleaseError::Transient(format!("{} returned HTTP {}", context, status))
            }
            _ => ReleaseError::Failure(format!("{} returned HTTP {}", context, status)),
        }
    }

    /// Classify a transport-level failure
    pub fn from_request(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() || err.is_connect() {
            return ReleaseError::Transient(format!("{}: {}", context, err));
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), context);
        }
        ReleaseError::Failure(format!("{}: {}", context, err))
    }
}

pub type ReleaseResult<T> = Result<T, ReleaseError>;
