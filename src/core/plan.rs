//! Input resolution: everything decided before the first step runs
//!
//! File config, command-line overrides and repository state are folded
//! into a single immutable [`ReleaseConfig`]. Any problem found here is a
//! validation or not-found error and nothing has been executed yet.

use crate::core::config::{ChangelogSourceKind, ReleaseFileConfig};
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::version::{latest_stable_tag, next_from_tags, BumpKind};
use crate::execution::poller::WaitOptions;
use crate::providers::git::{parse_github_remote, Vcs};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ReleaseOverrides {
    pub rc: bool,
    pub alpha: bool,
    pub release: bool,
    pub major: bool,
    pub dry_run: bool,
    pub previous_tag: Option<String>,
    pub branch: Option<String>,
    pub remote: Option<String>,
    pub changelog_source: Option<ChangelogSourceKind>,
    pub ci_timeout_secs: Option<u64>,
    pub ci_interval_secs: Option<u64>,
    pub artifact_timeout_secs: Option<u64>,
    pub artifact_interval_secs: Option<u64>,
}

impl ReleaseOverrides {
    pub fn bump(&self) -> ReleaseResult<BumpKind> {
        BumpKind::from_flags(self.rc, self.alpha, self.release, self.major)
    }
}

/// GitHub repository and credentials for API calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubTarget {
    pub owner: String,
    pub repo: String,
    pub api_url: String,
    pub token: String,
}

/// Fully resolved, read-only configuration for one release run
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub repo_root: PathBuf,
    /// Tag being released
    pub tag: String,
    pub previous_tag: Option<String>,
    pub bump: BumpKind,
    pub dry_run: bool,
    pub branch: String,
    pub remote: String,
    pub recipe_targets: Vec<String>,
    pub recipes_dir: PathBuf,
    pub changelog_path: PathBuf,
    pub changelog_source: ChangelogSourceKind,
    pub cache_prs: bool,
    pub workflows_dir: PathBuf,
    pub github_enabled: bool,
    /// Present when GitHub is enabled and a token is available
    pub github: Option<GitHubTarget>,
    pub package: Option<String>,
    pub package_index_url: String,
    pub image: Option<String>,
    pub ci_wait: WaitOptions,
    pub artifact_wait: WaitOptions,
}

impl ReleaseConfig {
    /// Resolve the release inputs against the repository
    pub async fn resolve(
        file: &ReleaseFileConfig,
        overrides: &ReleaseOverrides,
        vcs: &dyn Vcs,
        repo_root: &Path,
    ) -> ReleaseResult<Self> {
        let bump = overrides.bump()?;

        let tags = vcs.list_tags().await?;
        let explicit_previous = overrides
            .previous_tag
            .as_deref()
            .or(file.previous_release_tag.as_deref());
        let previous_tag = resolve_previous_tag(vcs, explicit_previous, &tags).await?;

        let tag = next_from_tags(&tags, bump)?;
        if tags.iter().any(|t| *t == tag) {
            return Err(ReleaseError::Validation(format!("tag {} already exists", tag)));
        }

        let explicit_branch = overrides.branch.clone().or_else(|| file.release.branch.clone());
        let branch = match &explicit_branch {
            Some(branch) => branch.clone(),
            None => vcs.current_branch().await?,
        };
        let remote = overrides
            .remote
            .clone()
            .unwrap_or_else(|| file.release.remote.clone());

        let github = resolve_github(file, vcs, &remote).await?;
        let changelog_source = overrides.changelog_source.unwrap_or(file.changelog.source);
        if changelog_source == ChangelogSourceKind::Prs && github.is_none() {
            return Err(ReleaseError::Validation(
                "pull request changelogs need GitHub enabled and a token (GITHUB_TOKEN)".to_string(),
            ));
        }

        let ci_wait = ci_wait_options(file, overrides.ci_timeout_secs, overrides.ci_interval_secs)?;
        let artifact_wait = artifact_wait_options(
            file,
            overrides.artifact_timeout_secs,
            overrides.artifact_interval_secs,
        )?;

        let recipes_dir = match &file.recipes.working_dir {
            Some(dir) => repo_root.join(dir),
            None => repo_root.to_path_buf(),
        };

        // Last, so a rejected release leaves the working tree alone
        if explicit_branch.is_some() && !overrides.dry_run {
            ensure_branch(vcs, &branch).await?;
        }

        info!(
            "Releasing {} (previous: {}) from {} to {}",
            tag,
            previous_tag.as_deref().unwrap_or("none"),
            branch,
            remote
        );

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            tag,
            previous_tag,
            bump,
            dry_run: overrides.dry_run,
            branch,
            remote,
            recipe_targets: file.recipes.targets.clone(),
            recipes_dir,
            changelog_path: repo_root.join(&file.changelog.output),
            changelog_source,
            cache_prs: file.changelog.cache_prs,
            workflows_dir: file.workflows_dir(),
            github_enabled: file.github.enabled,
            github,
            package: file.release.package.clone(),
            package_index_url: file.release.package_index_url.clone(),
            image: file.release.image.clone(),
            ci_wait,
            artifact_wait,
        })
    }

    /// Changelog path as given to `git add`
    pub fn changelog_relative(&self) -> PathBuf {
        self.changelog_path
            .strip_prefix(&self.repo_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.changelog_path.clone())
    }

    /// Why the CI wait is skipped, if it is
    pub fn ci_skip_reason(&self) -> Option<&'static str> {
        if !self.github_enabled {
            Some("GitHub integration disabled")
        } else if self.github.is_none() {
            Some("no GitHub token")
        } else {
            None
        }
    }
}

/// Previous release tag: the explicit one (which must exist), else the latest stable tag
pub async fn resolve_previous_tag(
    vcs: &dyn Vcs,
    explicit: Option<&str>,
    tags: &[String],
) -> ReleaseResult<Option<String>> {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tag) => {
            vcs.verify_tag(tag).await?;
            debug!("Using previous release tag {}", tag);
            Ok(Some(tag.to_string()))
        }
        None => Ok(latest_stable_tag(tags)),
    }
}

/// GitHub coordinates from config, discovering owner/repo from the remote URL
///
/// `None` when GitHub is disabled or no token is available.
pub async fn resolve_github(
    file: &ReleaseFileConfig,
    vcs: &dyn Vcs,
    remote: &str,
) -> ReleaseResult<Option<GitHubTarget>> {
    if !file.github.enabled {
        return Ok(None);
    }
    let Some(token) = file.github.resolved_token() else {
        debug!("No GitHub token configured");
        return Ok(None);
    };

    let (owner, repo) = match (&file.github.owner, &file.github.repo) {
        (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
        _ => {
            let url = vcs.remote_url(remote).await?;
            parse_github_remote(&url).ok_or_else(|| {
                ReleaseError::Validation(format!(
                    "cannot determine GitHub owner/repo from remote '{}' ({}); set github.owner and github.repo",
                    remote, url
                ))
            })?
        }
    };

    Ok(Some(GitHubTarget {
        owner,
        repo,
        api_url: file.github.api_url.clone(),
        token,
    }))
}

/// Check out `branch` unless HEAD is already on it. Returns whether it switched.
///
/// A detached HEAD is never "on" a branch, so it is always checked out.
pub async fn ensure_branch(vcs: &dyn Vcs, branch: &str) -> ReleaseResult<bool> {
    match vcs.current_branch().await {
        Ok(current) if current == branch => return Ok(false),
        Ok(_) | Err(ReleaseError::Validation(_)) => {}
        Err(e) => return Err(e),
    }
    vcs.checkout(branch).await?;
    info!("Checked out {}", branch);
    Ok(true)
}

/// CI wait options: command-line values over the file's `waits` section
pub fn ci_wait_options(
    file: &ReleaseFileConfig,
    timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
) -> ReleaseResult<WaitOptions> {
    WaitOptions::checked(
        timeout_secs.unwrap_or(file.waits.ci_timeout_secs),
        interval_secs.unwrap_or(file.waits.ci_interval_secs),
    )
}

/// Package and image wait options, resolved like [`ci_wait_options`]
pub fn artifact_wait_options(
    file: &ReleaseFileConfig,
    timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
) -> ReleaseResult<WaitOptions> {
    WaitOptions::checked(
        timeout_secs.unwrap_or(file.waits.artifact_timeout_secs),
        interval_secs.unwrap_or(file.waits.artifact_interval_secs),
    )
}
