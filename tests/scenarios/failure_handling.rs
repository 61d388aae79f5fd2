//! Test: Failure Handling - halting, timeouts and cancellation

use crate::helpers::*;
use releaser::core::{RunOutcome, StepKind, StepStatus};
use releaser::execution::CancelSignal;
use std::time::Duration;

/// A failure at step 3 leaves steps 1-2 done and 4-7 untouched
#[tokio::test]
async fn test_commit_failure_halts_the_run() {
    let harness = Harness::new().with_vcs(MockVcs::failing_on("commit"));

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 2);
    assert_eq!(
        run.outcome,
        Some(RunOutcome::FailedAt {
            index: 2,
            step: "Commit & tag".to_string(),
            error: "git commit failed".to_string(),
        })
    );
    assert_eq!(
        run.outcome.as_ref().unwrap().to_string(),
        "failed at step 3 (Commit & tag): git commit failed"
    );

    // The changelog was already written; nothing was tagged or pushed
    assert!(harness.changelog().is_some());
    assert_eq!(
        harness.vcs.mutations(),
        vec!["add CHANGELOG.md", "commit changelog: release v1.2.4"]
    );
    assert_eq!(harness.ci.calls(), 0);
    assert_eq!(harness.package.calls(), 0);
    assert_eq!(harness.sink.started_steps(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_recipe_failure_stops_before_changelog() {
    let harness = Harness::new().with_recipes(MockRecipes::failing_on("test"));

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 0);
    assert_eq!(harness.recipes.ran(), vec!["lint", "test"]);
    assert_eq!(
        error_of(&run, StepKind::BuildRecipes),
        "just test exited with status 1"
    );
    assert!(harness.changelog().is_none());
    assert!(harness.vcs.mutations().is_empty());
}

#[tokio::test]
async fn test_tag_push_failure_leaves_branch_pushed() {
    let harness = Harness::new().with_vcs(MockVcs::failing_on("push"));

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 3);
    // Fails on the first push, so the tag push is never attempted
    let pushes: Vec<String> = harness
        .vcs
        .mutations()
        .into_iter()
        .filter(|c| c.starts_with("push "))
        .collect();
    assert_eq!(pushes, vec!["push origin refs/heads/main"]);
}

#[tokio::test(start_paused = true)]
async fn test_artifact_deadline_is_a_timeout() {
    let harness = Harness::new().with_package(StaticCheck::never_ready("package widgets==1.2.4"));

    let run = harness.run(harness.config()).await;

    assert_halted_at(&run, 5);
    match run.outcome {
        Some(RunOutcome::TimedOut { index, ref step, ref error }) => {
            assert_eq!(index, 5);
            assert_eq!(step, "Package index");
            assert_eq!(error, "timed out waiting for package widgets==1.2.4 after 30s");
        }
        ref other => panic!("expected a timeout, got {:?}", other),
    }

    // Checks at 0, 5, ... 30 seconds
    assert_eq!(harness.package.calls(), 7);
    assert_eq!(harness.image.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_fails_the_waiting_step() {
    let harness = Harness::new().with_package(StaticCheck::never_ready("package widgets==1.2.4"));
    let cancel = CancelSignal::new();
    let _deadline = cancel.cancel_after(Duration::from_secs(12));

    let run = harness.run_with_cancel(harness.config(), cancel).await;

    assert_halted_at(&run, 5);
    assert_eq!(error_of(&run, StepKind::WaitForPackage), "cancelled");
    assert!(matches!(run.outcome, Some(RunOutcome::FailedAt { index: 5, .. })));
    assert_eq!(harness.package.calls(), 3);
}

#[tokio::test]
async fn test_cancel_before_start_runs_nothing() {
    let harness = Harness::new();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let run = harness.run_with_cancel(harness.config(), cancel).await;

    assert_halted_at(&run, 0);
    assert_eq!(status_of(&run, StepKind::BuildRecipes), StepStatus::Error);
    assert_eq!(harness.recipes.prepared(), 0);
    assert!(harness.vcs.mutations().is_empty());
}
