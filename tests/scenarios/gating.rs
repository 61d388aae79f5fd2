//! Test: Gating - steps skipped by configuration

use crate::helpers::*;
use releaser::core::{StepKind, StepStatus};
use releaser::execution::{ReleaseEvent, ReleaseOrchestrator, StepExecutor};

fn skip_reason(run: &releaser::PipelineRun, kind: StepKind) -> Option<String> {
    run.step(kind)
        .filter(|s| s.status == StepStatus::Skipped)
        .and_then(|s| s.detail.clone())
}

#[tokio::test]
async fn test_unconfigured_steps_are_skipped() {
    let harness = Harness::new();
    let mut config = harness.config();
    config.recipe_targets.clear();
    config.github_enabled = false;
    config.github = None;
    config.package = None;
    config.image = None;

    let run = harness.run(config).await;

    assert_run_succeeded(&run);
    assert_eq!(
        skip_reason(&run, StepKind::BuildRecipes).as_deref(),
        Some("no recipes configured")
    );
    assert_eq!(
        skip_reason(&run, StepKind::WaitForCi).as_deref(),
        Some("GitHub integration disabled")
    );
    assert_eq!(
        skip_reason(&run, StepKind::WaitForPackage).as_deref(),
        Some("no package configured")
    );
    assert_eq!(
        skip_reason(&run, StepKind::WaitForImage).as_deref(),
        Some("no image configured")
    );

    // A skipped step is never started and has no side effects
    assert_eq!(harness.sink.started_steps(), vec![1, 2, 3]);
    assert_eq!(harness.recipes.prepared(), 0);
    assert_eq!(harness.ci.calls(), 0);
    assert_eq!(harness.package.calls(), 0);
    assert_eq!(harness.image.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_skips_ci_wait() {
    let harness = Harness::new();
    let mut config = harness.config();
    config.github = None;

    let run = harness.run(config).await;

    assert_run_succeeded(&run);
    assert_eq!(
        skip_reason(&run, StepKind::WaitForCi).as_deref(),
        Some("no GitHub token")
    );
    assert_eq!(harness.ci.calls(), 0);
    assert_eq!(status_of(&run, StepKind::WaitForPackage), StepStatus::Done);
}

#[tokio::test]
async fn test_missing_ci_client_skips_ci_wait() {
    let harness = Harness::new();
    let mut collaborators = harness.collaborators();
    collaborators.ci = None;

    let executor = StepExecutor::new(harness.config(), collaborators);
    assert_eq!(executor.gate(StepKind::WaitForCi).as_deref(), Some("no CI client"));
    assert_eq!(executor.gate(StepKind::Changelog), None);

    let run = ReleaseOrchestrator::new(executor, harness.sink.clone())
        .run()
        .await;
    assert_run_succeeded(&run);
    assert_eq!(status_of(&run, StepKind::WaitForCi), StepStatus::Skipped);
}

#[tokio::test]
async fn test_skip_is_reported_as_a_finished_event() {
    let harness = Harness::new();
    let mut config = harness.config();
    config.image = None;

    harness.run(config).await;

    let skipped: Vec<(usize, Option<String>)> = harness
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ReleaseEvent::StepFinished {
                index,
                status: StepStatus::Skipped,
                detail,
                ..
            } => Some((index, detail)),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![(6, Some("no image configured".to_string()))]);
    assert!(!harness.sink.started_steps().contains(&6));
}
