//! Test: Release Branch - releasing from a branch other than the current one

use crate::helpers::*;
use releaser::core::config::ReleaseFileConfig;
use releaser::core::plan::{ReleaseConfig, ReleaseOverrides};

fn offline() -> ReleaseFileConfig {
    let mut file = ReleaseFileConfig::default();
    file.github.enabled = false;
    file
}

fn on_release_branch(dry_run: bool) -> ReleaseOverrides {
    ReleaseOverrides {
        branch: Some("release".to_string()),
        dry_run,
        ..Default::default()
    }
}

/// The release commit and tag land on the branch that gets pushed
#[tokio::test]
async fn test_release_branch_checked_out_before_commit() {
    let harness = Harness::new().with_vcs(MockVcs::on_branch("dev"));

    let config = ReleaseConfig::resolve(
        &offline(),
        &on_release_branch(false),
        harness.vcs.as_ref(),
        harness.repo(),
    )
    .await
    .unwrap();
    assert_eq!(config.branch, "release");
    assert_eq!(harness.vcs.branch(), "release");

    let run = harness.run(config).await;

    assert_run_succeeded(&run);
    assert_eq!(
        harness.vcs.mutations(),
        vec![
            "checkout release",
            "add CHANGELOG.md",
            "commit changelog: release v1.2.4",
            "tag v1.2.4 Release v1.2.4",
            "push origin refs/heads/release",
            "push origin refs/tags/v1.2.4",
        ]
    );
}

#[tokio::test]
async fn test_already_on_release_branch() {
    let harness = Harness::new().with_vcs(MockVcs::on_branch("release"));

    let config = ReleaseConfig::resolve(
        &offline(),
        &on_release_branch(false),
        harness.vcs.as_ref(),
        harness.repo(),
    )
    .await
    .unwrap();
    harness.run(config).await;

    assert!(!harness.vcs.mutations().iter().any(|m| m.starts_with("checkout ")));
}

#[tokio::test]
async fn test_dry_run_stays_on_current_branch() {
    let harness = Harness::new().with_vcs(MockVcs::on_branch("dev"));

    let config = ReleaseConfig::resolve(
        &offline(),
        &on_release_branch(true),
        harness.vcs.as_ref(),
        harness.repo(),
    )
    .await
    .unwrap();
    let run = harness.run(config).await;

    assert_run_succeeded(&run);
    assert_eq!(harness.vcs.branch(), "dev");
    assert!(harness.vcs.mutations().is_empty());
    assert!(harness
        .sink
        .messages()
        .iter()
        .any(|m| m == "Would push refs/heads/release to origin"));
}
