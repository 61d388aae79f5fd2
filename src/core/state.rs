//! Execution state models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single pipeline step
///
/// Transitions only move forward: `Pending -> Running -> {Done | Error}`,
/// or `Pending -> Skipped` when the step's gate is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Skipped,
    Error,
}

impl StepStatus {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Skipped | StepStatus::Error)
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Pending, StepStatus::Skipped)
                | (StepStatus::Running, StepStatus::Done)
                | (StepStatus::Running, StepStatus::Skipped)
                | (StepStatus::Running, StepStatus::Error)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Done => "done",
            StepStatus::Skipped => "skipped",
            StepStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    /// The step at `index` (0-based) reached `Error`
    FailedAt {
        index: usize,
        step: String,
        error: String,
    },
    /// A wait step's deadline elapsed
    TimedOut {
        index: usize,
        step: String,
        error: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    /// Index of the step that ended the run, if it did not succeed
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            RunOutcome::Success => None,
            RunOutcome::FailedAt { index, .. } | RunOutcome::TimedOut { index, .. } => Some(*index),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => f.write_str("success"),
            RunOutcome::FailedAt { index, step, error } => {
                write!(f, "failed at step {} ({}): {}", index + 1, step, error)
            }
            RunOutcome::TimedOut { index, step, error } => {
                write!(f, "timed out at step {} ({}): {}", index + 1, step, error)
            }
        }
    }
}
