//! Test: Success Chain - a full release with every step enabled

use crate::helpers::*;
use releaser::core::{RunOutcome, StepKind, StepStatus};
use releaser::execution::ReleaseEvent;

#[tokio::test]
async fn test_full_release_runs_every_step_in_order() {
    let harness = Harness::new();
    write_workflow(harness.repo(), "release.yml", RELEASE_WORKFLOW);

    let run = harness.run(harness.config()).await;

    assert_run_succeeded(&run);
    assert!(run.steps.iter().all(|s| s.status == StepStatus::Done));
    assert_eq!(harness.sink.started_steps(), vec![0, 1, 2, 3, 4, 5, 6]);

    assert_eq!(harness.recipes.ran(), vec!["lint", "test"]);
    assert_eq!(
        harness.vcs.mutations(),
        vec![
            "add CHANGELOG.md",
            "commit changelog: release v1.2.4",
            "tag v1.2.4 Release v1.2.4",
            "push origin refs/heads/main",
            "push origin refs/tags/v1.2.4",
        ]
    );

    assert_eq!(harness.ci.shas(), vec![TAG_SHA]);
    assert_eq!(harness.package.calls(), 1);
    assert_eq!(harness.image.calls(), 1);
}

#[tokio::test]
async fn test_changelog_section_is_prepended() {
    let harness = Harness::new();
    std::fs::write(
        harness.repo().join("CHANGELOG.md"),
        "## v1.2.3\n\n- Initial release (1234567)\n",
    )
    .unwrap();

    let run = harness.run(harness.config()).await;
    assert_run_succeeded(&run);

    let changelog = harness.changelog().unwrap();
    assert!(changelog.starts_with(
        "## v1.2.4\n\n- Add widget export (aaaaaaa)\n- Fix off-by-one in pager (bbbbbbb)\n\n## v1.2.3"
    ));
    assert_eq!(
        run.step(StepKind::Changelog).and_then(|s| s.detail.clone()),
        Some("2 commits -> CHANGELOG.md".to_string())
    );
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let harness = Harness::new();
    let run = harness.run(harness.config()).await;
    let events = harness.sink.events();

    match events.first() {
        Some(ReleaseEvent::RunStarted {
            run_id,
            tag,
            steps,
            dry_run,
        }) => {
            assert_eq!(*run_id, run.run_id);
            assert_eq!(tag, TAG);
            assert_eq!(steps.len(), 7);
            assert_eq!(steps[2], "Commit & tag");
            assert!(!dry_run);
        }
        other => panic!("expected RunStarted first, got {:?}", other),
    }

    assert_eq!(
        events.last(),
        Some(&ReleaseEvent::RunFinished {
            run_id: run.run_id,
            outcome: RunOutcome::Success,
        })
    );

    let finished = events
        .iter()
        .filter(|e| matches!(e, ReleaseEvent::StepFinished { .. }))
        .count();
    assert_eq!(finished, 7);

    // Every progress event belongs to a step that had started
    for event in &events {
        if let ReleaseEvent::StepProgress { index, current, total, .. } = event {
            assert!(harness.sink.started_steps().contains(index));
            assert!(current <= total);
        }
    }

    assert!(run.started_at.is_some() && run.finished_at.is_some());
}
