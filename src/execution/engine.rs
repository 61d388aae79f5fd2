//! Main execution engine - orchestrates a release run
//!
//! Steps run strictly in order. Each step's gate is evaluated first; a
//! closed gate skips the step without side effects. The first step that
//! ends in `Error` halts the run and every later step stays `Pending`.
//!
//! There is no rollback. A run that fails after tagging or pushing leaves
//! the tag and branch on the remote, and the release is resumed by hand.

use crate::core::error::ReleaseError;
use crate::core::pipeline::PipelineRun;
use crate::core::state::{RunOutcome, StepStatus};
use crate::execution::cancel::CancelSignal;
use crate::execution::events::{EventSink, ReleaseEvent, StepReporter};
use crate::execution::executor::{ExecutionResult, StepExecutor};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Release pipeline orchestrator
pub struct ReleaseOrchestrator {
    executor: StepExecutor,
    sink: Arc<dyn EventSink>,
    cancel: CancelSignal,
}

impl ReleaseOrchestrator {
    pub fn new(executor: StepExecutor, sink: Arc<dyn EventSink>) -> Self {
        Self {
            executor,
            sink,
            cancel: CancelSignal::new(),
        }
    }

    /// Use an externally controlled cancellation signal
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Execute the whole pipeline and return the finished run
    pub async fn run(&self) -> PipelineRun {
        let config = self.executor.config();
        let mut run = PipelineRun::new(config.tag.clone(), config.dry_run);
        run.started_at = Some(Utc::now());

        info!(
            "Starting release run {} for {}{}",
            run.run_id,
            run.tag,
            if run.dry_run { " (dry run)" } else { "" }
        );
        self.sink.emit(ReleaseEvent::RunStarted {
            run_id: run.run_id,
            tag: run.tag.clone(),
            steps: run.step_names(),
            dry_run: run.dry_run,
        });

        let mut outcome = RunOutcome::Success;

        for index in 0..run.steps.len() {
            let kind = run.steps[index].kind;

            if let Some(reason) = self.executor.gate(kind) {
                info!("Skipping {}: {}", kind.name(), reason);
                self.finish_step(&mut run, index, StepStatus::Skipped, Some(reason), None);
                continue;
            }

            self.set_status(&mut run, index, StepStatus::Running);
            self.sink.emit(ReleaseEvent::StepStarted {
                index,
                name: kind.name().to_string(),
            });

            let reporter = StepReporter::new(self.sink.clone(), index);
            let result = if self.cancel.is_cancelled() {
                ExecutionResult::Failed {
                    error: ReleaseError::Cancelled,
                }
            } else {
                tokio::select! {
                    result = self.executor.execute(kind, &reporter, &self.cancel) => result,
                    _ = self.cancel.cancelled() => ExecutionResult::Failed {
                        error: ReleaseError::Cancelled,
                    },
                }
            };

            match result {
                ExecutionResult::Done { detail } => {
                    self.finish_step(&mut run, index, StepStatus::Done, detail, None);
                }
                ExecutionResult::Skipped { reason } => {
                    info!("{} skipped: {}", kind.name(), reason);
                    self.finish_step(&mut run, index, StepStatus::Skipped, Some(reason), None);
                }
                ExecutionResult::Failed { error } => {
                    error!("Step {} failed: {}", kind.name(), error);
                    let message = error.to_string();
                    self.finish_step(&mut run, index, StepStatus::Error, None, Some(message.clone()));

                    let step = kind.name().to_string();
                    outcome = match error {
                        ReleaseError::Timeout { .. } => RunOutcome::TimedOut {
                            index,
                            step,
                            error: message,
                        },
                        _ => RunOutcome::FailedAt {
                            index,
                            step,
                            error: message,
                        },
                    };
                    break;
                }
            }
        }

        info!("Release run {} finished: {}", run.run_id, outcome);
        run.finished_at = Some(Utc::now());
        run.outcome = Some(outcome.clone());
        self.sink.emit(ReleaseEvent::RunFinished {
            run_id: run.run_id,
            outcome,
        });

        run
    }

    fn set_status(&self, run: &mut PipelineRun, index: usize, next: StepStatus) {
        if let Err(e) = run.steps[index].transition(next) {
            // Steps are only ever driven forward from here
            warn!("{}", e);
        }
    }

    fn finish_step(
        &self,
        run: &mut PipelineRun,
        index: usize,
        status: StepStatus,
        detail: Option<String>,
        error: Option<String>,
    ) {
        self.set_status(run, index, status);
        let step = &mut run.steps[index];
        step.detail = detail.clone();
        step.error = error.clone();

        self.sink.emit(ReleaseEvent::StepFinished {
            index,
            name: step.name.clone(),
            status,
            detail,
            error,
        });
    }
}
