//! Release run domain model

use crate::core::{
    state::{RunOutcome, StepStatus},
    step::{PipelineStep, StepKind},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One execution of the release pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run ID
    pub run_id: Uuid,

    /// Tag being released
    pub tag: String,

    pub dry_run: bool,

    /// Steps in execution order
    pub steps: Vec<PipelineStep>,

    /// Set once the run has finished
    pub outcome: Option<RunOutcome>,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a run with every step pending
    pub fn new(tag: impl Into<String>, dry_run: bool) -> Self {
        let steps = StepKind::ALL
            .iter()
            .enumerate()
            .map(|(index, kind)| PipelineStep::new(index, *kind))
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            tag: tag.into(),
            dry_run,
            steps,
            outcome: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn step(&self, kind: StepKind) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().is_some_and(RunOutcome::is_success)
    }

    /// Number of steps in a terminal state
    pub fn finished_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_terminal()).count()
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.finished_steps() as f64 / self.steps.len() as f64
    }
}
