//! CLI output formatting
//!
//! The headless front end: every [`ReleaseEvent`] becomes at most one line
//! on stdout, and a finished run is summarised as a step table.

use crate::core::pipeline::PipelineRun;
use crate::core::state::{RunOutcome, StepStatus};
use crate::execution::events::{EventSink, ReleaseEvent};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a spinner for a single wait outside a release run
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Done => style("DONE").green().to_string(),
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
        StepStatus::Error => style("ERROR").red().to_string(),
    }
}

fn status_icon(status: StepStatus) -> Emoji<'static, 'static> {
    match status {
        StepStatus::Done => CHECK,
        StepStatus::Error => CROSS,
        StepStatus::Skipped => SKIP,
        StepStatus::Running => SPINNER,
        StepStatus::Pending => INFO,
    }
}

/// Format a release event as a single line. `total` is the number of steps.
pub fn format_event(event: &ReleaseEvent, total: usize) -> Option<String> {
    let line = match event {
        ReleaseEvent::RunStarted {
            run_id,
            tag,
            dry_run,
            ..
        } => format!(
            "{} Releasing {}{} ({})",
            ROCKET,
            style(tag).bold(),
            if *dry_run {
                style(" [dry run]").yellow().to_string()
            } else {
                String::new()
            },
            style(&run_id.to_string()[..8]).dim()
        ),
        ReleaseEvent::StepStarted { index, name } => format!(
            "[{}/{}] {}",
            style(index + 1).cyan(),
            style(total).dim(),
            style(name).bold()
        ),
        ReleaseEvent::StepProgress {
            current,
            total: of,
            label,
            ..
        } => match label {
            Some(label) => format!("      {} {}/{} {}", SPINNER, current, of, style(label).dim()),
            None => format!("      {} {}/{}", SPINNER, current, of),
        },
        ReleaseEvent::StepMessage { line, .. } => format!("      {}", line),
        ReleaseEvent::StepFinished {
            index,
            name,
            status,
            detail,
            error,
        } => {
            let mut line = format!(
                "{}{} {}",
                status_icon(*status),
                style(format!("[{}/{}]", index + 1, total)).dim(),
                name
            );
            match (status, error, detail) {
                (StepStatus::Error, Some(error), _) => {
                    line.push_str(&format!(": {}", style(error).red()));
                }
                (StepStatus::Skipped, _, Some(reason)) => {
                    line.push_str(&format!(" {}", style(format!("(skipped: {})", reason)).dim()));
                }
                (_, _, Some(detail)) => {
                    line.push_str(&format!(" {}", style(format!("({})", detail)).dim()));
                }
                _ => {}
            }
            line
        }
        ReleaseEvent::RunFinished { outcome, .. } => match outcome {
            RunOutcome::Success => format!("{} Release {}", CHECK, style("succeeded").green()),
            failed => format!("{} Release {}", CROSS, style(failed).red()),
        },
    };
    Some(line)
}

/// Headless sink: formatted lines on stdout, flushed as they arrive
#[derive(Debug, Default)]
pub struct LineSink {
    total_steps: AtomicUsize,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for LineSink {
    fn emit(&self, event: ReleaseEvent) {
        if let ReleaseEvent::RunStarted { steps, .. } = &event {
            self.total_steps.store(steps.len(), Ordering::SeqCst);
        }
        if let Some(line) = format_event(&event, self.total_steps.load(Ordering::SeqCst)) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", line);
            let _ = stdout.flush();
        }
    }
}

/// Print a horizontal rule spanning the terminal width
pub fn print_separator() {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
        .min(100);
    println!("{}", style("─".repeat(width)).dim());
}

/// Summary table of step statuses after a run
pub fn format_run_summary(run: &PipelineRun) -> String {
    let width = run.steps.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let mut out = String::new();

    for step in &run.steps {
        let note = match (step.status, &step.error, &step.detail) {
            (StepStatus::Error, Some(error), _) => error.clone(),
            (StepStatus::Pending, _, _) => "not attempted".to_string(),
            (_, _, Some(detail)) => detail.clone(),
            _ => String::new(),
        };
        out.push_str(&format!(
            "  {:>2}. {:<width$}  {:<8}  {}\n",
            step.index + 1,
            step.name,
            format_step_status(step.status),
            style(note).dim(),
            width = width
        ));
    }
    out
}

/// Print the summary table and the final verdict
pub fn print_run_summary(run: &PipelineRun) {
    println!();
    print_separator();
    print!("{}", format_run_summary(run));
    print_separator();

    match &run.outcome {
        Some(RunOutcome::Success) if run.dry_run => {
            println!("{} Dry run for {} complete; nothing was changed", INFO, style(&run.tag).bold())
        }
        Some(RunOutcome::Success) => println!("{} Released {}", CHECK, style(&run.tag).bold().green()),
        Some(failed) => {
            println!("{} {}", CROSS, style(failed).red());
            if failed.failed_index().is_some_and(|i| i >= 2) && !run.dry_run {
                println!(
                    "{} Tags or commits already created were left in place; fix the problem and resume by hand",
                    WARN
                );
            }
        }
        None => println!("{} Run did not finish", WARN),
    }
}
