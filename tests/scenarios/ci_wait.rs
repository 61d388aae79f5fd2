//! Test: CI Wait - scoping and failure of workflow runs for the release tag

use crate::helpers::*;
use releaser::core::{RunOutcome, StepKind, StepStatus};

/// Only workflows that run on a tag push matching the release tag are awaited
#[tokio::test(start_paused = true)]
async fn test_waits_only_for_tag_push_workflows() {
    let harness = Harness::new().with_ci(ScriptedCi::new(vec![
        vec![workflow_run("CI", "in_progress", None)],
        vec![
            workflow_run("CI", "in_progress", None),
            workflow_run("Release", "queued", None),
        ],
        vec![
            workflow_run("CI", "completed", Some("failure")),
            workflow_run("Release", "completed", Some("success")),
        ],
    ]));
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);
    write_workflow(harness.repo(), "ci.yml", CI_WORKFLOW);
    write_workflow(
        harness.repo(),
        "docs.yml",
        "name: Docs\non:\n  push:\n    tags: [\"docs-*\"]\n",
    );

    let run = harness.run(harness.config()).await;

    // The failing branch CI run is not part of the release
    assert_run_succeeded(&run);
    assert_eq!(harness.ci.calls(), 3);
    assert!(harness.ci.shas().iter().all(|sha| sha == TAG_SHA));
    assert!(harness.vcs.calls().contains(&"rev_parse v1.2.4".to_string()));

    let detail = run
        .step(StepKind::WaitForCi)
        .and_then(|s| s.detail.clone())
        .unwrap();
    assert_eq!(detail, "1 tag-push workflow(s): Release succeeded after 30s");
}

#[tokio::test(start_paused = true)]
async fn test_failed_release_workflow_fails_the_step() {
    let harness = Harness::new().with_ci(ScriptedCi::new(vec![
        vec![workflow_run("Release", "in_progress", None)],
        vec![workflow_run("Release", "completed", Some("failure"))],
    ]));
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 4);
    assert!(matches!(run.outcome, Some(RunOutcome::FailedAt { index: 4, .. })));
    assert_eq!(
        error_of(&run, StepKind::WaitForCi),
        "one or more release workflows failed: Release #42 (failure)"
    );
    assert_eq!(harness.package.calls(), 0);
}

/// Without tag-push workflows on disk, every run for the commit is awaited
#[tokio::test(start_paused = true)]
async fn test_no_tag_push_workflows_waits_for_all_runs() {
    let harness = Harness::new().with_ci(ScriptedCi::fixed(vec![
        workflow_run("build", "completed", Some("success")),
        workflow_run("docs", "completed", Some("cancelled")),
    ]));

    let run = harness.run(harness.config()).await;

    assert_eq!(status_of(&run, StepKind::WaitForCi), StepStatus::Error);
    assert!(error_of(&run, StepKind::WaitForCi).contains("docs #42 (cancelled)"));
}

#[tokio::test(start_paused = true)]
async fn test_runs_that_never_appear_time_out() {
    let harness = Harness::new().with_ci(ScriptedCi::fixed(Vec::new()));
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 4);
    assert!(matches!(run.outcome, Some(RunOutcome::TimedOut { index: 4, .. })));
    assert_eq!(
        error_of(&run, StepKind::WaitForCi),
        "timed out waiting for CI runs for 4f9c2e1 after 60s"
    );
    // Checks at 0, 15, 30, 45 and 60 seconds
    assert_eq!(harness.ci.calls(), 5);
}

/// A completed run without a conclusion does not count as a failure
#[tokio::test]
async fn test_missing_conclusion_is_not_a_failure() {
    let harness = Harness::new().with_ci(ScriptedCi::fixed(vec![workflow_run(
        "Release",
        "completed",
        None,
    )]));
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    let run = harness.run(harness.config()).await;
    assert_run_succeeded(&run);
}
