//! Test utilities for release scenarios

use async_trait::async_trait;
use releaser::changelog::GitLogSource;
use releaser::core::config::ChangelogSourceKind;
use releaser::core::plan::{GitHubTarget, ReleaseConfig};
use releaser::core::version::BumpKind;
use releaser::core::{PipelineRun, ReleaseError, ReleaseResult, RunOutcome, StepKind, StepStatus};
use releaser::execution::{
    CancelSignal, Collaborators, EventSink, ReadinessCheck, ReleaseEvent, ReleaseOrchestrator,
    StepExecutor, WaitOptions,
};
use releaser::providers::{CiRunSource, Commit, RecipeRunner, Vcs, WorkflowRun};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TAG: &str = "v1.2.4";
pub const PREVIOUS_TAG: &str = "v1.2.3";
pub const TAG_SHA: &str = "4f9c2e1d0b7a6c5e4f3a2b1c0d9e8f7a6b5c4d3e";

/// Git double that records every call and can be told to fail one operation
pub struct MockVcs {
    calls: Mutex<Vec<String>>,
    branch: Mutex<String>,
    fail_on: Option<&'static str>,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::on_branch("main")
    }

    /// HEAD starts on `branch`
    pub fn on_branch(branch: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            branch: Mutex::new(branch.to_string()),
            fail_on: None,
        }
    }

    /// Fail the named operation (`add`, `commit`, `tag`, `push`, ...)
    pub fn failing_on(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::new()
        }
    }

    pub fn branch(&self) -> String {
        self.branch.lock().unwrap().clone()
    }

    fn record(&self, op: &str, call: String) -> ReleaseResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(op) {
            return Err(ReleaseError::Failure(format!("git {} failed", op)));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change the repository or the remote
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["checkout ", "add ", "commit ", "tag ", "push "]
                    .iter()
                    .any(|prefix| c.starts_with(prefix))
            })
            .collect()
    }
}

#[async_trait]
impl Vcs for MockVcs {
    async fn list_tags(&self) -> ReleaseResult<Vec<String>> {
        self.record("list_tags", "list_tags".to_string())?;
        Ok(vec![PREVIOUS_TAG.to_string()])
    }

    async fn verify_tag(&self, tag: &str) -> ReleaseResult<String> {
        self.record("verify_tag", format!("verify_tag {}", tag))?;
        Ok(TAG_SHA.to_string())
    }

    async fn rev_parse(&self, rev: &str) -> ReleaseResult<String> {
        self.record("rev_parse", format!("rev_parse {}", rev))?;
        Ok(TAG_SHA.to_string())
    }

    async fn current_branch(&self) -> ReleaseResult<String> {
        self.record("current_branch", "current_branch".to_string())?;
        Ok(self.branch())
    }

    async fn remote_url(&self, remote: &str) -> ReleaseResult<String> {
        self.record("remote_url", format!("remote_url {}", remote))?;
        Ok("git@github.com:acme/widgets.git".to_string())
    }

    async fn log_between(&self, base: Option<&str>, head: &str) -> ReleaseResult<Vec<Commit>> {
        self.record("log", format!("log {}..{}", base.unwrap_or(""), head))?;
        Ok(vec![
            Commit {
                sha: "aaaaaaa1111111".to_string(),
                subject: "Add widget export".to_string(),
                body: String::new(),
            },
            Commit {
                sha: "bbbbbbb2222222".to_string(),
                subject: "Fix off-by-one in pager".to_string(),
                body: String::new(),
            },
        ])
    }

    async fn add(&self, paths: &[PathBuf]) -> ReleaseResult<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.record("add", format!("add {}", paths.join(" ")))
    }

    async fn commit(&self, message: &str) -> ReleaseResult<()> {
        self.record("commit", format!("commit {}", message))
    }

    async fn create_tag(&self, tag: &str, message: &str) -> ReleaseResult<()> {
        self.record("tag", format!("tag {} {}", tag, message))
    }

    async fn push(&self, remote: &str, refspec: &str) -> ReleaseResult<()> {
        self.record("push", format!("push {} {}", remote, refspec))
    }

    async fn checkout(&self, branch: &str) -> ReleaseResult<()> {
        self.record("checkout", format!("checkout {}", branch))?;
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }
}

/// Recipe runner double
pub struct MockRecipes {
    prepared: AtomicU32,
    ran: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl MockRecipes {
    pub fn new() -> Self {
        Self {
            prepared: AtomicU32::new(0),
            ran: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn failing_on(target: &'static str) -> Self {
        Self {
            fail_on: Some(target),
            ..Self::new()
        }
    }

    pub fn prepared(&self) -> u32 {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeRunner for MockRecipes {
    async fn prepare(&self) -> ReleaseResult<()> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&self, target: &str) -> ReleaseResult<()> {
        self.ran.lock().unwrap().push(target.to_string());
        if self.fail_on == Some(target) {
            return Err(ReleaseError::Failure(format!(
                "just {} exited with status 1",
                target
            )));
        }
        Ok(())
    }
}

/// CI double that replays snapshots of workflow runs, repeating the last one
pub struct ScriptedCi {
    snapshots: Vec<Vec<WorkflowRun>>,
    calls: AtomicU32,
    shas: Mutex<Vec<String>>,
}

impl ScriptedCi {
    pub fn new(snapshots: Vec<Vec<WorkflowRun>>) -> Self {
        Self {
            snapshots,
            calls: AtomicU32::new(0),
            shas: Mutex::new(Vec::new()),
        }
    }

    /// Every poll sees the same runs
    pub fn fixed(runs: Vec<WorkflowRun>) -> Self {
        Self::new(vec![runs])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shas(&self) -> Vec<String> {
        self.shas.lock().unwrap().clone()
    }
}

#[async_trait]
impl CiRunSource for ScriptedCi {
    async fn runs_for_commit(&self, sha: &str) -> ReleaseResult<Vec<WorkflowRun>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.shas.lock().unwrap().push(sha.to_string());
        let snapshot = self
            .snapshots
            .get(call)
            .or_else(|| self.snapshots.last())
            .cloned()
            .unwrap_or_default();
        Ok(snapshot)
    }
}

pub fn workflow_run(name: &str, status: &str, conclusion: Option<&str>) -> WorkflowRun {
    WorkflowRun {
        id: 1,
        name: name.to_string(),
        status: status.to_string(),
        conclusion: conclusion.map(str::to_string),
        run_number: 42,
        html_url: String::new(),
        created_at: None,
    }
}

/// Availability double: ready on the `ready_on`-th check, or never
pub struct StaticCheck {
    resource: String,
    ready_on: Option<u32>,
    calls: AtomicU32,
}

impl StaticCheck {
    pub fn ready_on(resource: &str, n: u32) -> Self {
        Self {
            resource: resource.to_string(),
            ready_on: Some(n),
            calls: AtomicU32::new(0),
        }
    }

    pub fn never_ready(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            ready_on: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessCheck for StaticCheck {
    fn resource(&self) -> String {
        self.resource.clone()
    }

    async fn check_ready(&self) -> ReleaseResult<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.ready_on.is_some_and(|n| call >= n))
    }
}

/// Sink that keeps every event
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ReleaseEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ReleaseEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Status lines emitted by steps, in order
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReleaseEvent::StepMessage { line, .. } => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Indices of the steps that emitted `StepStarted`
    pub fn started_steps(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReleaseEvent::StepStarted { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: ReleaseEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Write a workflow definition under `.github/workflows`
pub fn write_workflow(repo: &Path, file: &str, yaml: &str) {
    let dir = repo.join(".github/workflows");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), yaml).unwrap();
}

pub const RELEASE_WORKFLOW: &str = r#"
name: Release
on:
  push:
    tags: ["v*"]
"#;

pub const CI_WORKFLOW: &str = r#"
name: CI
on:
  push:
    branches: [main]
  pull_request:
"#;

/// Mocks for one release run in a scratch repository
pub struct Harness {
    pub dir: TempDir,
    pub vcs: Arc<MockVcs>,
    pub recipes: Arc<MockRecipes>,
    pub ci: Arc<ScriptedCi>,
    pub package: Arc<StaticCheck>,
    pub image: Arc<StaticCheck>,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    /// Everything succeeds on the first try
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            vcs: Arc::new(MockVcs::new()),
            recipes: Arc::new(MockRecipes::new()),
            ci: Arc::new(ScriptedCi::fixed(vec![workflow_run(
                "Release",
                "completed",
                Some("success"),
            )])),
            package: Arc::new(StaticCheck::ready_on("package widgets==1.2.4", 1)),
            image: Arc::new(StaticCheck::ready_on("image acme/widgets:v1.2.4", 1)),
            sink: Arc::new(CollectingSink::default()),
        }
    }

    pub fn with_vcs(mut self, vcs: MockVcs) -> Self {
        self.vcs = Arc::new(vcs);
        self
    }

    pub fn with_recipes(mut self, recipes: MockRecipes) -> Self {
        self.recipes = Arc::new(recipes);
        self
    }

    pub fn with_ci(mut self, ci: ScriptedCi) -> Self {
        self.ci = Arc::new(ci);
        self
    }

    pub fn with_package(mut self, check: StaticCheck) -> Self {
        self.package = Arc::new(check);
        self
    }

    pub fn repo(&self) -> &Path {
        self.dir.path()
    }

    pub fn changelog(&self) -> Option<String> {
        std::fs::read_to_string(self.repo().join("CHANGELOG.md")).ok()
    }

    /// A live release of `v1.2.4` with every step enabled
    pub fn config(&self) -> ReleaseConfig {
        let repo = self.repo().to_path_buf();
        ReleaseConfig {
            repo_root: repo.clone(),
            tag: TAG.to_string(),
            previous_tag: Some(PREVIOUS_TAG.to_string()),
            bump: BumpKind::Patch,
            dry_run: false,
            branch: "main".to_string(),
            remote: "origin".to_string(),
            recipe_targets: vec!["lint".to_string(), "test".to_string()],
            recipes_dir: repo.clone(),
            changelog_path: repo.join("CHANGELOG.md"),
            changelog_source: ChangelogSourceKind::Commits,
            cache_prs: false,
            workflows_dir: PathBuf::from(".github/workflows"),
            github_enabled: true,
            github: Some(GitHubTarget {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                api_url: "https://api.github.com".to_string(),
                token: "test-token".to_string(),
            }),
            package: Some("widgets".to_string()),
            package_index_url: "https://pypi.org".to_string(),
            image: Some("acme/widgets".to_string()),
            ci_wait: WaitOptions::from_secs(60, 15),
            artifact_wait: WaitOptions::from_secs(30, 5),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            vcs: self.vcs.clone(),
            recipes: self.recipes.clone(),
            changelog: Arc::new(GitLogSource::new(self.vcs.clone())),
            ci: Some(self.ci.clone() as Arc<dyn CiRunSource>),
            package: Some(self.package.clone() as Arc<dyn ReadinessCheck>),
            image: Some(self.image.clone() as Arc<dyn ReadinessCheck>),
        }
    }

    pub async fn run(&self, config: ReleaseConfig) -> PipelineRun {
        self.run_with_cancel(config, CancelSignal::new()).await
    }

    pub async fn run_with_cancel(&self, config: ReleaseConfig, cancel: CancelSignal) -> PipelineRun {
        let executor = StepExecutor::new(config, self.collaborators());
        ReleaseOrchestrator::new(executor, self.sink.clone())
            .with_cancel(cancel)
            .run()
            .await
    }
}

pub fn status_of(run: &PipelineRun, kind: StepKind) -> StepStatus {
    run.step(kind).map(|s| s.status).unwrap()
}

pub fn error_of(run: &PipelineRun, kind: StepKind) -> String {
    run.step(kind).and_then(|s| s.error.clone()).unwrap_or_default()
}

pub fn assert_run_succeeded(run: &PipelineRun) {
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Success),
        "expected success, steps: {:?}",
        run.statuses()
    );
}

/// Assert the run stopped at `index` and nothing after it was attempted
pub fn assert_halted_at(run: &PipelineRun, index: usize) {
    assert_eq!(run.outcome.as_ref().and_then(|o| o.failed_index()), Some(index));
    assert_eq!(run.steps[index].status, StepStatus::Error);
    for step in &run.steps[..index] {
        assert!(
            matches!(step.status, StepStatus::Done | StepStatus::Skipped),
            "step {} should have finished, was {}",
            step.name,
            step.status
        );
    }
    for step in &run.steps[index + 1..] {
        assert_eq!(step.status, StepStatus::Pending, "step {} should not have run", step.name);
    }
}
