//! Where changelog entries come from

use crate::changelog::cache::PrCache;
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::execution::events::StepReporter;
use crate::execution::retry::RetryPolicy;
use crate::providers::git::{Commit, Vcs};
use crate::providers::github::{PullRequest, PullRequestSource};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw material for one changelog section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogEntries {
    Commits(Vec<Commit>),
    PullRequests(Vec<PullRequest>),
}

impl ChangelogEntries {
    pub fn len(&self) -> usize {
        match self {
            ChangelogEntries::Commits(c) => c.len(),
            ChangelogEntries::PullRequests(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// "3 commits" / "1 pull request"
    pub fn describe(&self) -> String {
        let (n, noun) = match self {
            ChangelogEntries::Commits(c) => (c.len(), "commit"),
            ChangelogEntries::PullRequests(p) => (p.len(), "pull request"),
        };
        format!("{} {}{}", n, noun, if n == 1 { "" } else { "s" })
    }
}

/// Gathers entries between the previous release and `head`.
///
/// Gathering is read-only and runs in dry-run mode too.
#[async_trait]
pub trait ChangelogSource: Send + Sync {
    /// Everything reachable from `head` when there is no previous release
    async fn gather(
        &self,
        previous: Option<&str>,
        head: &str,
        reporter: &StepReporter,
    ) -> ReleaseResult<ChangelogEntries>;
}

/// Commits from `git log previous..head`
pub struct GitLogSource {
    vcs: Arc<dyn Vcs>,
}

impl GitLogSource {
    pub fn new(vcs: Arc<dyn Vcs>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl ChangelogSource for GitLogSource {
    async fn gather(
        &self,
        previous: Option<&str>,
        head: &str,
        reporter: &StepReporter,
    ) -> ReleaseResult<ChangelogEntries> {
        let commits = self.vcs.log_between(previous, head).await?;
        reporter.message(format!(
            "{} commits since {}",
            commits.len(),
            previous.unwrap_or("the beginning of history")
        ));
        Ok(ChangelogEntries::Commits(commits))
    }
}

/// Merged pull requests for the commits in the range
///
/// Every API call goes through the retry policy. Results are cached per
/// range when a cache is configured; cache writes are best-effort and
/// skipped in dry-run mode. The cache always holds the full list; the
/// limit only trims what is returned.
pub struct GitHubPrSource {
    api: Arc<dyn PullRequestSource>,
    vcs: Arc<dyn Vcs>,
    retry: RetryPolicy,
    cache: Option<PrCache>,
    limit: Option<usize>,
    dry_run: bool,
}

impl GitHubPrSource {
    pub fn new(api: Arc<dyn PullRequestSource>, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            api,
            vcs,
            retry: RetryPolicy::default(),
            cache: None,
            limit: None,
            dry_run: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: PrCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Keep at most `limit` pull requests, in discovery order. Zero means no limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Read the cache but never write it
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn limited(&self, mut prs: Vec<PullRequest>, reporter: &StepReporter) -> Vec<PullRequest> {
        if let Some(limit) = self.limit.filter(|&limit| prs.len() > limit) {
            prs.truncate(limit);
            reporter.message(format!("Limiting to {} pull request(s)", limit));
        }
        prs
    }

    async fn commit_shas(&self, previous: Option<&str>, head: &str) -> ReleaseResult<Vec<String>> {
        match previous {
            Some(base) => {
                let api = self.api.clone();
                self.retry
                    .run(
                        "compare commits",
                        || {
                            let api = api.clone();
                            async move { api.commits_between(base, head).await }
                        },
                        ReleaseError::is_transient,
                    )
                    .await
            }
            // The compare API needs a base; walk local history instead
            None => Ok(self
                .vcs
                .log_between(None, head)
                .await?
                .into_iter()
                .map(|c| c.sha)
                .collect()),
        }
    }

    async fn fetch(
        &self,
        previous: Option<&str>,
        head: &str,
        reporter: &StepReporter,
    ) -> ReleaseResult<Vec<PullRequest>> {
        let shas = self.commit_shas(previous, head).await?;
        let total = shas.len();
        let mut seen = HashSet::new();
        let mut prs = Vec::new();

        for (i, sha) in shas.iter().enumerate() {
            reporter.progress(i + 1, total, Some("commits scanned"));

            let api = self.api.clone();
            let found = self
                .retry
                .run(
                    "list pulls for commit",
                    || {
                        let api = api.clone();
                        async move { api.pull_requests_for_commit(sha).await }
                    },
                    ReleaseError::is_transient,
                )
                .await?;

            for pr in found {
                if seen.insert(pr.number) {
                    prs.push(pr);
                }
            }
        }

        Ok(prs)
    }
}

#[async_trait]
impl ChangelogSource for GitHubPrSource {
    async fn gather(
        &self,
        previous: Option<&str>,
        head: &str,
        reporter: &StepReporter,
    ) -> ReleaseResult<ChangelogEntries> {
        let (owner, repo) = self.api.repository();
        // Key on the resolved commit so a moving branch never hits a stale entry
        let head_sha = self.vcs.rev_parse(head).await?;
        let base = previous.unwrap_or("");

        if let Some(cache) = &self.cache {
            if let Some(prs) = cache.get(&owner, &repo, base, &head_sha) {
                reporter.message(format!("{} merged pull requests (cached)", prs.len()));
                return Ok(ChangelogEntries::PullRequests(self.limited(prs, reporter)));
            }
        }

        let prs = self.fetch(previous, &head_sha, reporter).await?;
        info!("Found {} merged pull requests since {}", prs.len(), base);
        reporter.message(format!("{} merged pull requests", prs.len()));

        match &self.cache {
            Some(cache) if !self.dry_run => {
                if let Err(e) = cache.set(&owner, &repo, base, &head_sha, &prs) {
                    warn!("Failed to write PR cache in {}: {}", cache.dir().display(), e);
                }
            }
            Some(_) => debug!("Dry run: not writing PR cache"),
            None => {}
        }

        Ok(ChangelogEntries::PullRequests(self.limited(prs, reporter)))
    }
}
