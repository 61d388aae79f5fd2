//! releaser - release pipeline orchestrator

pub mod changelog;
pub mod cli;
pub mod core;
pub mod execution;
pub mod providers;

// Re-export commonly used types
pub use core::{PipelineRun, ReleaseConfig, ReleaseError, ReleaseOverrides, ReleaseResult, RunOutcome, StepStatus};
pub use execution::{Collaborators, EventSink, ReleaseEvent, ReleaseOrchestrator, StepExecutor};
