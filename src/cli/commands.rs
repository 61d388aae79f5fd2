//! CLI command definitions

use crate::core::config::ChangelogSourceKind;
use crate::core::plan::ReleaseOverrides;
use clap::{Args, Subcommand};

/// Version bump flags shared by `release` and `tag next`
#[derive(Debug, Args, Clone, Default)]
pub struct BumpArgs {
    /// Release candidate (X.Y.ZrcN)
    #[arg(long)]
    pub rc: bool,

    /// Alpha prerelease (X.Y.ZaN)
    #[arg(long)]
    pub alpha: bool,

    /// Minor release instead of a patch
    #[arg(long)]
    pub release: bool,

    /// Major release (with --release)
    #[arg(long)]
    pub major: bool,
}

/// Run the full release pipeline
#[derive(Debug, Args, Clone)]
pub struct ReleaseCommand {
    #[command(flatten)]
    pub bump: BumpArgs,

    /// Report what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Plain line output even on a terminal
    #[arg(long)]
    pub no_tui: bool,

    /// Previous release tag (defaults to the latest stable tag)
    #[arg(long)]
    pub prev_tag: Option<String>,

    /// Branch to push (defaults to the current branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Remote to push to
    #[arg(long)]
    pub remote: Option<String>,

    /// Build the changelog from merged pull requests
    #[arg(long, conflicts_with = "use_history")]
    pub use_prs: bool,

    /// Build the changelog from git history
    #[arg(long)]
    pub use_history: bool,

    #[arg(long)]
    pub ci_timeout_secs: Option<u64>,

    #[arg(long)]
    pub ci_interval_secs: Option<u64>,

    #[arg(long)]
    pub artifact_timeout_secs: Option<u64>,

    #[arg(long)]
    pub artifact_interval_secs: Option<u64>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

impl ReleaseCommand {
    pub fn overrides(&self) -> ReleaseOverrides {
        let changelog_source = if self.use_prs {
            Some(ChangelogSourceKind::Prs)
        } else if self.use_history {
            Some(ChangelogSourceKind::Commits)
        } else {
            None
        };

        ReleaseOverrides {
            rc: self.bump.rc,
            alpha: self.bump.alpha,
            release: self.bump.release,
            major: self.bump.major,
            dry_run: self.dry_run,
            previous_tag: self.prev_tag.clone(),
            branch: self.branch.clone(),
            remote: self.remote.clone(),
            changelog_source,
            ci_timeout_secs: self.ci_timeout_secs,
            ci_interval_secs: self.ci_interval_secs,
            artifact_timeout_secs: self.artifact_timeout_secs,
            artifact_interval_secs: self.artifact_interval_secs,
        }
    }
}

/// Tag commands
#[derive(Debug, Subcommand, Clone)]
pub enum TagCommand {
    /// Print the next release tag
    Next(TagNextCommand),
}

#[derive(Debug, Args, Clone)]
pub struct TagNextCommand {
    #[command(flatten)]
    pub bump: BumpArgs,

    /// Create the tag as an annotated tag
    #[arg(long)]
    pub create: bool,
}

/// GitHub Actions commands
#[derive(Debug, Subcommand, Clone)]
pub enum CiCommand {
    /// List workflows that run when a tag is pushed
    Workflows(CiWorkflowsCommand),

    /// Wait for the workflow runs of a tag to finish
    Wait(CiWaitCommand),
}

#[derive(Debug, Args, Clone)]
pub struct CiWorkflowsCommand {
    #[arg(long)]
    pub tag: String,
}

#[derive(Debug, Args, Clone)]
pub struct CiWaitCommand {
    #[arg(long)]
    pub tag: String,

    /// Wait for every run on the commit, not just tag-push workflows
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub interval_secs: Option<u64>,
}

/// Artifact availability commands
#[derive(Debug, Subcommand, Clone)]
pub enum CheckCommand {
    /// Check a package on the package index
    Package(CheckPackageCommand),

    /// Check an image on the container registry
    Image(CheckImageCommand),
}

#[derive(Debug, Args, Clone)]
pub struct CheckPackageCommand {
    pub name: String,

    #[arg(long)]
    pub version: Option<String>,

    /// Poll until available instead of checking once
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CheckImageCommand {
    /// Image reference, e.g. `acme/api:v1.2.0`
    pub image: String,

    /// Poll until available instead of checking once
    #[arg(long)]
    pub wait: bool,
}

/// Generate the changelog section only
#[derive(Debug, Args, Clone)]
pub struct ChangelogCommand {
    /// Print the section instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Section heading (defaults to the next patch tag)
    #[arg(long)]
    pub version: Option<String>,

    /// Use merged pull requests instead of git history
    #[arg(long)]
    pub use_prs: bool,

    /// Previous release tag (overrides config and the latest stable tag)
    #[arg(long)]
    pub prev_tag: Option<String>,

    /// Head of the changelog range
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Maximum number of pull requests to include (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,
}

impl ChangelogCommand {
    /// Explicit section heading: `--version`, else a head ref other than `HEAD`.
    /// `None` means the next patch tag.
    pub fn heading(&self) -> Option<String> {
        match &self.version {
            Some(version) => Some(version.clone()),
            None if self.head != "HEAD" && !self.head.is_empty() => Some(self.head.clone()),
            None => None,
        }
    }
}
