//! Release configuration from `.releaser.yml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name at the repository root
pub const DEFAULT_CONFIG_FILE: &str = ".releaser.yml";

/// Where changelog entries come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogSourceKind {
    /// Git commit history between the previous tag and HEAD
    #[default]
    Commits,
    /// Merged GitHub pull requests in the same range
    Prs,
}

/// Top-level release configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseFileConfig {
    /// Previous release tag (defaults to the latest stable tag)
    pub previous_release_tag: Option<String>,

    pub recipes: RecipesConfig,

    pub changelog: ChangelogConfig,

    pub github: GitHubConfig,

    pub release: ReleaseSection,

    pub waits: WaitConfig,

    pub slack: SlackConfig,

    /// Workflow definitions, relative to the repository root
    pub workflows_dir: Option<PathBuf>,
}

/// `just` recipes run before anything is committed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipesConfig {
    pub targets: Vec<String>,

    /// Directory containing the justfile (defaults to the repository root)
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangelogConfig {
    pub output: PathBuf,

    pub source: ChangelogSourceKind,

    /// Cache merged PR lookups under `.releaser/cache`
    pub cache_prs: bool,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("CHANGELOG.md"),
            source: ChangelogSourceKind::Commits,
            cache_prs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub enabled: bool,

    /// Repository owner (discovered from the remote URL when unset)
    pub owner: Option<String>,

    pub repo: Option<String>,

    /// API token (falls back to `GITHUB_TOKEN`)
    pub token: Option<String>,

    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            owner: None,
            repo: None,
            token: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}

impl GitHubConfig {
    /// Configured token, or `GITHUB_TOKEN` from the environment
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseSection {
    pub remote: String,

    /// Branch to push (defaults to the current branch)
    pub branch: Option<String>,

    /// Package name to wait for on the package index
    pub package: Option<String>,

    pub package_index_url: String,

    /// Container image to wait for, e.g. `myorg/app`
    pub image: Option<String>,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: None,
            package: None,
            package_index_url: "https://pypi.org".to_string(),
            image: None,
        }
    }
}

/// Poll timeouts and intervals for the wait steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub ci_timeout_secs: u64,
    pub ci_interval_secs: u64,
    pub artifact_timeout_secs: u64,
    pub artifact_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            ci_timeout_secs: 30 * 60,
            ci_interval_secs: 15,
            artifact_timeout_secs: 5 * 60,
            artifact_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook (falls back to `SLACK_WEBHOOK_URL`)
    pub webhook_url: Option<String>,
}

impl SlackConfig {
    pub fn resolved_webhook(&self) -> Option<String> {
        self.webhook_url
            .clone()
            .or_else(|| std::env::var("SLACK_WEBHOOK_URL").ok())
            .filter(|u| !u.trim().is_empty())
    }
}

impl ReleaseFileConfig {
    /// Load release configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse release configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file deserializes to null
        let config: ReleaseFileConfig = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the release configuration
    pub fn validate(&self) -> Result<()> {
        for target in &self.recipes.targets {
            if target.trim().is_empty() {
                anyhow::bail!("recipes.targets contains an empty target name");
            }
        }

        if self.changelog.output.as_os_str().is_empty() {
            anyhow::bail!("changelog.output must not be empty");
        }

        if self.changelog.source == ChangelogSourceKind::Prs && !self.github.enabled {
            anyhow::bail!("changelog.source 'prs' requires github.enabled");
        }

        if self.release.remote.trim().is_empty() {
            anyhow::bail!("release.remote must not be empty");
        }

        if let Some(package) = &self.release.package {
            if package.trim().is_empty() {
                anyhow::bail!("release.package must not be empty when set");
            }
        }

        if let Some(image) = &self.release.image {
            if image.trim().is_empty() || image.contains(char::is_whitespace) {
                anyhow::bail!("release.image '{}' is not a valid image name", image);
            }
        }

        let waits = &self.waits;
        if waits.ci_interval_secs == 0 || waits.artifact_interval_secs == 0 {
            anyhow::bail!("wait intervals must be at least one second");
        }
        if waits.ci_timeout_secs < waits.ci_interval_secs {
            anyhow::bail!(
                "waits.ci_timeout_secs ({}) is shorter than waits.ci_interval_secs ({})",
                waits.ci_timeout_secs,
                waits.ci_interval_secs
            );
        }
        if waits.artifact_timeout_secs < waits.artifact_interval_secs {
            anyhow::bail!(
                "waits.artifact_timeout_secs ({}) is shorter than waits.artifact_interval_secs ({})",
                waits.artifact_timeout_secs,
                waits.artifact_interval_secs
            );
        }

        Ok(())
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.workflows_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::core::trigger::WORKFLOWS_DIR))
    }
}
