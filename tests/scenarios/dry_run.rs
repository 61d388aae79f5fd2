//! Test: Dry Run - preview without side effects

use crate::helpers::*;
use releaser::core::{PipelineRun, StepStatus};

fn dry(harness: &Harness) -> releaser::ReleaseConfig {
    let mut config = harness.config();
    config.dry_run = true;
    config
}

fn classification(run: &PipelineRun) -> Vec<(String, StepStatus, Option<String>)> {
    run.steps
        .iter()
        .map(|s| (s.name.clone(), s.status, s.detail.clone()))
        .collect()
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let harness = Harness::new();
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    let run = harness.run(dry(&harness)).await;

    assert_run_succeeded(&run);
    assert!(run.dry_run);
    assert!(run.steps.iter().all(|s| s.status == StepStatus::Done));

    // Read-only work still happens
    assert_eq!(harness.recipes.prepared(), 1);
    assert!(harness.vcs.calls().iter().any(|c| c == "log v1.2.3..HEAD"));

    // Nothing that changes state does
    assert!(harness.recipes.ran().is_empty());
    assert!(harness.vcs.mutations().is_empty());
    assert!(harness.changelog().is_none());
    assert_eq!(harness.ci.calls(), 0);
    assert_eq!(harness.package.calls(), 0);
    assert_eq!(harness.image.calls(), 0);
}

#[tokio::test]
async fn test_dry_run_describes_each_action() {
    let harness = Harness::new();
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    harness.run(dry(&harness)).await;
    let messages = harness.sink.messages();

    for expected in [
        "Would run: just lint",
        "Would run: just test",
        "Would prepend section for v1.2.4 (2 commits) to CHANGELOG.md",
        "  ## v1.2.4",
        "  - Add widget export (aaaaaaa)",
        "Would commit CHANGELOG.md with message \"changelog: release v1.2.4\"",
        "Would create tag v1.2.4 (\"Release v1.2.4\")",
        "Would push refs/heads/main to origin",
        "Would push refs/tags/v1.2.4 to origin",
        "Would wait up to 60s for 1 tag-push workflow(s): Release on v1.2.4 (every 15s)",
        "Would wait up to 30s for package widgets==1.2.4 (every 5s)",
    ] {
        assert!(
            messages.iter().any(|m| m == expected),
            "missing {:?} in {:#?}",
            expected,
            messages
        );
    }
}

#[tokio::test]
async fn test_dry_run_is_repeatable() {
    let harness = Harness::new();

    let first = harness.run(dry(&harness)).await;
    let second = harness.run(dry(&harness)).await;

    assert_eq!(classification(&first), classification(&second));
    assert_ne!(first.run_id, second.run_id);
    assert!(harness.vcs.mutations().is_empty());
}

#[tokio::test]
async fn test_dry_and_live_runs_skip_the_same_steps() {
    let harness = Harness::new();
    let mut live = harness.config();
    live.recipe_targets.clear();
    live.package = None;
    live.image = None;
    live.github_enabled = false;
    live.github = None;

    let mut preview = live.clone();
    preview.dry_run = true;

    let dry_run = harness.run(preview).await;
    let live_run = harness.run(live).await;

    assert_run_succeeded(&dry_run);
    assert_run_succeeded(&live_run);
    assert_eq!(dry_run.statuses(), live_run.statuses());
    assert_eq!(
        live_run.statuses(),
        vec![
            StepStatus::Skipped,
            StepStatus::Done,
            StepStatus::Done,
            StepStatus::Done,
            StepStatus::Skipped,
            StepStatus::Skipped,
            StepStatus::Skipped,
        ]
    );
}
