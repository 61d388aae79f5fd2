//! Interactive display for terminals
//!
//! [`DisplayState::apply`] is a pure reducer over release events. The
//! renderer drains the event queue on its own task, folds each event into
//! the state and redraws one progress line per step. Events dropped because
//! the renderer fell behind are counted, not replayed.

use crate::cli::output::{format_step_status, style};
use crate::core::state::{RunOutcome, StepStatus};
use crate::execution::events::ReleaseEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// What the display knows about one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub name: String,
    pub status: StepStatus,
    /// Latest sub-step progress: current, total, label
    pub progress: Option<(usize, usize, Option<String>)>,
    pub last_message: Option<String>,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl StepView {
    fn new(name: String) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            progress: None,
            last_message: None,
            detail: None,
            error: None,
        }
    }

    /// One-line rendering without the status column
    pub fn summary(&self) -> String {
        match self.status {
            StepStatus::Error => self.error.clone().unwrap_or_default(),
            StepStatus::Done | StepStatus::Skipped => self.detail.clone().unwrap_or_default(),
            StepStatus::Running => {
                let progress = self.progress.as_ref().map(|(current, total, label)| match label {
                    Some(label) => format!("{}/{} {}", current, total, label),
                    None => format!("{}/{}", current, total),
                });
                match (progress, &self.last_message) {
                    (Some(p), Some(m)) => format!("{} · {}", p, m),
                    (Some(p), None) => p,
                    (None, Some(m)) => m.clone(),
                    (None, None) => String::new(),
                }
            }
            StepStatus::Pending => String::new(),
        }
    }
}

/// Display state folded from the event stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub tag: String,
    pub dry_run: bool,
    pub steps: Vec<StepView>,
    pub current: Option<usize>,
    pub outcome: Option<RunOutcome>,
    /// Events lost because the renderer lagged
    pub dropped: u64,
}

impl DisplayState {
    /// Fold one event into the state
    pub fn apply(mut self, event: &ReleaseEvent) -> Self {
        match event {
            ReleaseEvent::RunStarted {
                tag, steps, dry_run, ..
            } => {
                self.tag = tag.clone();
                self.dry_run = *dry_run;
                self.steps = steps.iter().cloned().map(StepView::new).collect();
                self.current = None;
                self.outcome = None;
            }
            ReleaseEvent::StepStarted { index, .. } => {
                if let Some(step) = self.steps.get_mut(*index) {
                    step.status = StepStatus::Running;
                    self.current = Some(*index);
                }
            }
            ReleaseEvent::StepProgress {
                index,
                current,
                total,
                label,
            } => {
                if let Some(step) = self.steps.get_mut(*index) {
                    step.progress = Some((*current, *total, label.clone()));
                }
            }
            ReleaseEvent::StepMessage { index, line } => {
                if let Some(step) = self.steps.get_mut(*index) {
                    step.last_message = Some(line.clone());
                }
            }
            ReleaseEvent::StepFinished {
                index,
                status,
                detail,
                error,
                ..
            } => {
                if let Some(step) = self.steps.get_mut(*index) {
                    step.status = *status;
                    step.detail = detail.clone();
                    step.error = error.clone();
                }
                if self.current == Some(*index) {
                    self.current = None;
                }
            }
            ReleaseEvent::RunFinished { outcome, .. } => {
                self.outcome = Some(outcome.clone());
                self.current = None;
            }
        }
        self
    }

    pub fn note_dropped(mut self, count: u64) -> Self {
        self.dropped += count;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Steps in a terminal state
    pub fn finished_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_terminal()).count()
    }
}

/// One progress line per step inside a [`MultiProgress`]
struct Renderer {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
}

impl Renderer {
    fn new(state: &DisplayState) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_spinner()
            .template("{prefix} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let total = state.steps.len();
        let bars = state
            .steps
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(format!("[{}/{}]", i + 1, total));
                bar
            })
            .collect();

        Self { multi, bars }
    }

    fn draw(&self, state: &DisplayState) {
        for (step, bar) in state.steps.iter().zip(&self.bars) {
            if bar.is_finished() {
                continue;
            }
            let message = format!(
                "{} {} {}",
                style(&step.name).bold(),
                format_step_status(step.status),
                style(step.summary()).dim()
            );
            match step.status {
                StepStatus::Pending => bar.set_message(message),
                StepStatus::Running => {
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar.set_message(message);
                }
                _ => bar.finish_with_message(message),
            }
        }
    }

    fn finish(&self) {
        // Steps never reached stay on screen as pending
        for bar in &self.bars {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        let _ = self.multi.clear();
    }
}

/// Drain the event queue into a live display until the run finishes
///
/// Returns the final state so the caller can print a summary.
pub async fn run_display(mut events: broadcast::Receiver<ReleaseEvent>) -> DisplayState {
    let mut state = DisplayState::default();
    let mut renderer: Option<Renderer> = None;

    loop {
        match events.recv().await {
            Ok(event) => {
                let started = matches!(event, ReleaseEvent::RunStarted { .. });
                state = state.apply(&event);
                if started {
                    renderer = Some(Renderer::new(&state));
                }
                if let Some(renderer) = &renderer {
                    renderer.draw(&state);
                }
                if state.is_finished() {
                    break;
                }
            }
            Err(RecvError::Lagged(count)) => {
                debug!("Display fell behind, dropped {} events", count);
                state = state.note_dropped(count);
            }
            Err(RecvError::Closed) => break,
        }
    }

    if let Some(renderer) = renderer {
        renderer.finish();
    }
    state
}
