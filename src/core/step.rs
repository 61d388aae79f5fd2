//! Step domain model

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::state::StepStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed release steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    BuildRecipes,
    Changelog,
    CommitAndTag,
    Push,
    WaitForCi,
    WaitForPackage,
    WaitForImage,
}

impl StepKind {
    pub const ALL: [StepKind; 7] = [
        StepKind::BuildRecipes,
        StepKind::Changelog,
        StepKind::CommitAndTag,
        StepKind::Push,
        StepKind::WaitForCi,
        StepKind::WaitForPackage,
        StepKind::WaitForImage,
    ];

    /// Human-readable step name
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::BuildRecipes => "Build recipes",
            StepKind::Changelog => "Generate changelog",
            StepKind::CommitAndTag => "Commit & tag",
            StepKind::Push => "Push to remote",
            StepKind::WaitForCi => "Wait for workflows",
            StepKind::WaitForPackage => "Package index",
            StepKind::WaitForImage => "Container registry",
        }
    }
}

/// A single step in a release run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Position in the run, 0-based
    pub index: usize,

    pub kind: StepKind,

    pub name: String,

    pub status: StepStatus,

    /// Why the step was skipped or what it reported on completion
    pub detail: Option<String>,

    /// Error message when `status` is `Error`
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineStep {
    pub fn new(index: usize, kind: StepKind) -> Self {
        Self {
            index,
            kind,
            name: kind.name().to_string(),
            status: StepStatus::Pending,
            detail: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next`, refusing any transition that would rewind the step
    pub fn transition(&mut self, next: StepStatus) -> ReleaseResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ReleaseError::Failure(format!(
                "step '{}' cannot move from {} to {}",
                self.name, self.status, next
            )));
        }

        let now = Utc::now();
        match next {
            StepStatus::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.finished_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}
