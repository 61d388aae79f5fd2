//! Git operations via the system `git` binary

use crate::core::error::{ReleaseError, ReleaseResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A commit used as changelog input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub subject: String,
    pub body: String,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

/// Version-control operations the release pipeline needs
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn list_tags(&self) -> ReleaseResult<Vec<String>>;

    /// Commit SHA of an existing tag, or `NotFound`
    async fn verify_tag(&self, tag: &str) -> ReleaseResult<String>;

    async fn rev_parse(&self, rev: &str) -> ReleaseResult<String>;

    /// Current branch name. A detached HEAD is a validation error.
    async fn current_branch(&self) -> ReleaseResult<String>;

    async fn remote_url(&self, remote: &str) -> ReleaseResult<String>;

    /// Commits in `base..head`, or everything reachable from `head` without a base
    async fn log_between(&self, base: Option<&str>, head: &str) -> ReleaseResult<Vec<Commit>>;

    async fn add(&self, paths: &[PathBuf]) -> ReleaseResult<()>;

    async fn commit(&self, message: &str) -> ReleaseResult<()>;

    /// Create an annotated tag
    async fn create_tag(&self, tag: &str, message: &str) -> ReleaseResult<()>;

    async fn push(&self, remote: &str, refspec: &str) -> ReleaseResult<()>;

    /// Switch the working tree to an existing branch
    async fn checkout(&self, branch: &str) -> ReleaseResult<()>;
}

/// [`Vcs`] backed by `git` subprocesses run in the repository root
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    timeout_secs: u64,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Run `git <args>` and return stdout
    async fn git(&self, args: &[&str]) -> ReleaseResult<String> {
        debug!("git {}", args.join(" "));

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new("git")
                .args(args)
                .current_dir(&self.repo)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| timed_out(args, self.timeout_secs))?
        .map_err(|e| ReleaseError::Failure(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("git {} exited with code {}: {}", args.join(" "), exit_code, stderr.trim());
            return Err(ReleaseError::Failure(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn list_tags(&self) -> ReleaseResult<Vec<String>> {
        let out = self.git(&["tag", "-l"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn verify_tag(&self, tag: &str) -> ReleaseResult<String> {
        let reference = format!("refs/tags/{}^{{commit}}", tag);
        match self.git(&["rev-parse", "--verify", "--quiet", &reference]).await {
            Ok(sha) => Ok(sha.trim().to_string()),
            Err(ReleaseError::Failure(_)) => Err(ReleaseError::NotFound(format!(
                "tag {} does not exist in the repository",
                tag
            ))),
            Err(e) => Err(e),
        }
    }

    async fn rev_parse(&self, rev: &str) -> ReleaseResult<String> {
        let rev = if rev.is_empty() { "HEAD" } else { rev };
        let spec = format!("{}^{{commit}}", rev);
        Ok(self.git(&["rev-parse", &spec]).await?.trim().to_string())
    }

    async fn current_branch(&self) -> ReleaseResult<String> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let branch = branch.trim();
        if branch.is_empty() || branch == "HEAD" {
            return Err(ReleaseError::Validation(
                "HEAD is detached; check out a branch or pass --branch".to_string(),
            ));
        }
        Ok(branch.to_string())
    }

    async fn remote_url(&self, remote: &str) -> ReleaseResult<String> {
        let key = format!("remote.{}.url", remote);
        Ok(self.git(&["config", "--get", &key]).await?.trim().to_string())
    }

    async fn log_between(&self, base: Option<&str>, head: &str) -> ReleaseResult<Vec<Commit>> {
        let head = if head.is_empty() { "HEAD" } else { head };
        let range = match base {
            Some(base) => format!("{}..{}", base, head),
            None => head.to_string(),
        };
        let out = self.git(&["log", "--format=%H%x00%s%x00%b%x00", &range]).await?;
        Ok(parse_log(&out))
    }

    async fn add(&self, paths: &[PathBuf]) -> ReleaseResult<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> ReleaseResult<()> {
        self.git(&["commit", "-m", message]).await.map(|_| ())
    }

    async fn create_tag(&self, tag: &str, message: &str) -> ReleaseResult<()> {
        self.git(&["tag", "-a", tag, "-m", message]).await.map(|_| ())
    }

    async fn push(&self, remote: &str, refspec: &str) -> ReleaseResult<()> {
        self.git(&["push", remote, refspec]).await.map(|_| ())
    }

    async fn checkout(&self, branch: &str) -> ReleaseResult<()> {
        self.git(&["checkout", branch]).await.map(|_| ())
    }
}

/// A hung git command is a step failure, not a readiness deadline
fn timed_out(args: &[&str], timeout_secs: u64) -> ReleaseError {
    ReleaseError::Failure(format!(
        "git {} did not finish within {}s",
        args.first().copied().unwrap_or_default(),
        timeout_secs
    ))
}

/// Parse `git log --format=%H%x00%s%x00%b%x00` output.
///
/// Every commit contributes three NUL-terminated fields, so bodies that
/// span several lines stay intact.
pub fn parse_log(out: &str) -> Vec<Commit> {
    let fields: Vec<&str> = out.split('\0').collect();
    fields
        .chunks_exact(3)
        .filter_map(|chunk| {
            let sha = chunk[0].trim();
            if sha.is_empty() {
                return None;
            }
            Some(Commit {
                sha: sha.to_string(),
                subject: chunk[1].trim().to_string(),
                body: chunk[2].trim().to_string(),
            })
        })
        .collect()
}

/// Extract `(owner, repo)` from a GitHub remote URL
///
/// Accepts `https://github.com/owner/repo[.git]` and `git@github.com:owner/repo[.git]`.
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;

    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
