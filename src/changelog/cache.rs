//! On-disk cache of merged pull requests per commit range

use crate::core::error::ReleaseResult;
use crate::providers::github::PullRequest;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cache directory, relative to the repository root
pub const DEFAULT_CACHE_DIR: &str = ".releaser/cache";

/// JSON files keyed by owner, repo and commit range
#[derive(Debug, Clone)]
pub struct PrCache {
    dir: PathBuf,
}

impl PrCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under `.releaser/cache` in `repo_root`
    pub fn in_repo(repo_root: &Path) -> Self {
        Self::new(repo_root.join(DEFAULT_CACHE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, owner: &str, repo: &str, base: &str, head: &str) -> PathBuf {
        self.dir.join(cache_key(owner, repo, base, head))
    }

    /// Cached PRs for the range, or `None` on a miss or unreadable entry
    pub fn get(&self, owner: &str, repo: &str, base: &str, head: &str) -> Option<Vec<PullRequest>> {
        let path = self.path(owner, repo, base, head);
        let data = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(prs) => {
                debug!("PR cache hit: {}", path.display());
                Some(prs)
            }
            Err(e) => {
                debug!("Ignoring unreadable PR cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn set(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
        prs: &[PullRequest],
    ) -> ReleaseResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(prs).map_err(std::io::Error::other)?;
        std::fs::write(self.path(owner, repo, base, head), data)?;
        Ok(())
    }
}

/// File name for a range; path separators and colons become underscores
pub fn cache_key(owner: &str, repo: &str, base: &str, head: &str) -> String {
    let safe = |s: &str| {
        let s = s.trim().replace(['/', ':'], "_");
        if s.is_empty() {
            "empty".to_string()
        } else {
            s
        }
    };
    format!("{}_{}_{}_{}.json", safe(owner), safe(repo), safe(base), safe(head))
}
