//! GitHub REST API: Actions runs and merged pull requests

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::execution::events::StepReporter;
use crate::execution::poller::ReadinessCheck;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PER_PAGE: usize = 100;

/// A single GitHub Actions workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// `queued`, `in_progress`, `completed`, ...
    #[serde(default)]
    pub status: String,
    /// `success`, `failure`, `cancelled`, ... once completed
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl WorkflowRun {
    pub fn is_finished(&self) -> bool {
        self.status == "completed"
    }

    /// Finished with a conclusion other than success
    pub fn is_failed(&self) -> bool {
        self.is_finished()
            && self
                .conclusion
                .as_deref()
                .is_some_and(|c| !c.is_empty() && c != "success")
    }
}

/// A merged pull request, as used for changelog entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author: String,
    #[serde(default)]
    pub merged_at: String,
}

/// Lists CI runs for a commit
#[async_trait]
pub trait CiRunSource: Send + Sync {
    async fn runs_for_commit(&self, sha: &str) -> ReleaseResult<Vec<WorkflowRun>>;
}

/// Commit ranges and the pull requests that introduced them
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Owner/repo pair, used for cache keys
    fn repository(&self) -> (String, String);

    /// SHAs of commits in `base...head`
    async fn commits_between(&self, base: &str, head: &str) -> ReleaseResult<Vec<String>>;

    /// Merged pull requests containing `sha`
    async fn pull_requests_for_commit(&self, sha: &str) -> ReleaseResult<Vec<PullRequest>>;
}

/// GitHub REST API client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct ComparePage {
    #[serde(default)]
    total_commits: usize,
    #[serde(default)]
    commits: Vec<CompareCommit>,
}

#[derive(Debug, Deserialize)]
struct CompareCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    merged_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

impl GitHubClient {
    pub fn new(
        api_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> ReleaseResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("releaser/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReleaseError::Failure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> ReleaseResult<T> {
        debug!("GET {} {:?}", url, query);

        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReleaseError::from_request(e, context))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::from_status(status.as_u16(), context));
        }

        response
            .json()
            .await
            .map_err(|e| ReleaseError::Failure(format!("{}: invalid response: {}", context, e)))
    }
}

#[async_trait]
impl CiRunSource for GitHubClient {
    async fn runs_for_commit(&self, sha: &str) -> ReleaseResult<Vec<WorkflowRun>> {
        let url = self.repo_url("actions/runs");
        let mut runs = Vec::new();
        let mut page = 1usize;

        loop {
            let query = [
                ("head_sha", sha.to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let body: RunsPage = self.get_json(&url, &query, "list workflow runs").await?;
            let fetched = body.workflow_runs.len();
            runs.extend(body.workflow_runs);

            if fetched < PER_PAGE || runs.len() >= body.total_count {
                break;
            }
            page += 1;
        }

        Ok(runs)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    fn repository(&self) -> (String, String) {
        (self.owner.clone(), self.repo.clone())
    }

    async fn commits_between(&self, base: &str, head: &str) -> ReleaseResult<Vec<String>> {
        let url = self.repo_url(&format!("compare/{}...{}", base, head));
        let mut shas = Vec::new();
        let mut page = 1usize;

        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let body: ComparePage = self.get_json(&url, &query, "compare commits").await?;
            let fetched = body.commits.len();
            shas.extend(body.commits.into_iter().map(|c| c.sha));

            if fetched < PER_PAGE || shas.len() >= body.total_commits {
                break;
            }
            page += 1;
        }

        Ok(shas)
    }

    async fn pull_requests_for_commit(&self, sha: &str) -> ReleaseResult<Vec<PullRequest>> {
        let url = self.repo_url(&format!("commits/{}/pulls", sha));
        let query = [("per_page", "10".to_string())];
        let pulls: Vec<ApiPull> = self.get_json(&url, &query, "list pulls for commit").await?;

        Ok(pulls
            .into_iter()
            .filter_map(|p| {
                let merged_at = p.merged_at?;
                Some(PullRequest {
                    number: p.number,
                    title: p.title.unwrap_or_default(),
                    body: p.body.unwrap_or_default(),
                    author: p.user.map(|u| u.login).unwrap_or_default(),
                    merged_at: merged_at.get(..10).unwrap_or(&merged_at).to_string(),
                })
            })
            .collect())
    }
}

/// Where a set of CI runs stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiState {
    /// Still waiting for runs to appear or to finish
    Waiting {
        seen: usize,
        finished: usize,
        expected: usize,
    },
    Succeeded {
        runs: usize,
    },
    /// Every run finished and at least one did not succeed
    Failed {
        failed: Vec<String>,
    },
}

/// Evaluate runs for a commit against the workflows expected to fire
///
/// With `expected` non-empty, only runs from those workflows count and at
/// least that many must exist. Without it, every run counts.
pub fn evaluate_runs(runs: &[WorkflowRun], expected: &[String]) -> CiState {
    let waited: Vec<&WorkflowRun> = runs
        .iter()
        .filter(|r| expected.is_empty() || expected.iter().any(|name| *name == r.name))
        .collect();

    let seen = waited.len();
    let finished = waited.iter().filter(|r| r.is_finished()).count();
    let all_seen = seen > 0 && seen >= expected.len();

    if !all_seen || finished < seen {
        return CiState::Waiting {
            seen,
            finished,
            expected: expected.len().max(seen),
        };
    }

    let failed: Vec<String> = waited
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| {
            format!(
                "{} #{} ({})",
                r.name,
                r.run_number,
                r.conclusion.as_deref().unwrap_or("unknown")
            )
        })
        .collect();

    if failed.is_empty() {
        CiState::Succeeded { runs: seen }
    } else {
        CiState::Failed { failed }
    }
}

/// Readiness check: all CI runs for a commit have completed successfully
pub struct CiCompletionCheck {
    source: Arc<dyn CiRunSource>,
    sha: String,
    expected: Vec<String>,
    reporter: StepReporter,
}

impl CiCompletionCheck {
    pub fn new(
        source: Arc<dyn CiRunSource>,
        sha: impl Into<String>,
        expected: Vec<String>,
        reporter: StepReporter,
    ) -> Self {
        Self {
            source,
            sha: sha.into(),
            expected,
            reporter,
        }
    }
}

#[async_trait]
impl ReadinessCheck for CiCompletionCheck {
    fn resource(&self) -> String {
        format!("CI runs for {}", self.sha.get(..7).unwrap_or(&self.sha))
    }

    async fn check_ready(&self) -> ReleaseResult<bool> {
        let runs = self.source.runs_for_commit(&self.sha).await?;

        match evaluate_runs(&runs, &self.expected) {
            CiState::Waiting { seen: 0, .. } => {
                self.reporter.message("Waiting for workflow runs to start");
                Ok(false)
            }
            CiState::Waiting {
                finished, expected, ..
            } => {
                self.reporter.progress(finished, expected, Some("workflow runs finished"));
                Ok(false)
            }
            CiState::Succeeded { runs } => {
                self.reporter.progress(runs, runs, Some("workflow runs finished"));
                Ok(true)
            }
            CiState::Failed { failed } => Err(ReleaseError::Failure(format!(
                "one or more release workflows failed: {}",
                failed.join(", ")
            ))),
        }
    }
}
