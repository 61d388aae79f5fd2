//! Step executor - gates and actions for each release step

use crate::changelog::{render_section, write_changelog, ChangelogSource};
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::plan::ReleaseConfig;
use crate::core::step::StepKind;
use crate::core::trigger::{load_workflow_triggers, triggered_by_tag};
use crate::execution::cancel::CancelSignal;
use crate::execution::events::StepReporter;
use crate::execution::poller::{wait_until_ready, ReadinessCheck, WaitOptions};
use crate::providers::git::Vcs;
use crate::providers::github::{CiCompletionCheck, CiRunSource};
use crate::providers::just::RecipeRunner;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of executing a step
#[derive(Debug)]
pub enum ExecutionResult {
    /// Step completed; `detail` summarises what it did
    Done { detail: Option<String> },
    /// Step decided at run time that there was nothing to do
    Skipped { reason: String },
    Failed { error: ReleaseError },
}

/// External systems the steps act on
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn Vcs>,
    pub recipes: Arc<dyn RecipeRunner>,
    pub changelog: Arc<dyn ChangelogSource>,
    /// Present when GitHub is configured with a token
    pub ci: Option<Arc<dyn CiRunSource>>,
    pub package: Option<Arc<dyn ReadinessCheck>>,
    pub image: Option<Arc<dyn ReadinessCheck>>,
}

/// Runs individual steps against the resolved configuration
pub struct StepExecutor {
    config: ReleaseConfig,
    collaborators: Collaborators,
}

impl StepExecutor {
    pub fn new(config: ReleaseConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// Reason to skip `kind` without running it, if its gate is closed
    ///
    /// Gates depend only on configuration, so dry and live runs skip the
    /// same steps.
    pub fn gate(&self, kind: StepKind) -> Option<String> {
        let config = &self.config;
        match kind {
            StepKind::BuildRecipes if config.recipe_targets.is_empty() => {
                Some("no recipes configured".to_string())
            }
            StepKind::WaitForCi => match config.ci_skip_reason() {
                Some(reason) => Some(reason.to_string()),
                None if self.collaborators.ci.is_none() => Some("no CI client".to_string()),
                None => None,
            },
            StepKind::WaitForPackage if config.package.is_none() => {
                Some("no package configured".to_string())
            }
            StepKind::WaitForImage if config.image.is_none() => {
                Some("no image configured".to_string())
            }
            _ => None,
        }
    }

    /// Execute a step and return the result
    pub async fn execute(
        &self,
        kind: StepKind,
        reporter: &StepReporter,
        cancel: &CancelSignal,
    ) -> ExecutionResult {
        info!("Executing step: {}", kind.name());

        let result = match kind {
            StepKind::BuildRecipes => self.build_recipes(reporter).await,
            StepKind::Changelog => self.changelog(reporter).await,
            StepKind::CommitAndTag => self.commit_and_tag(reporter).await,
            StepKind::Push => self.push(reporter).await,
            StepKind::WaitForCi => self.wait_for_ci(reporter, cancel).await,
            StepKind::WaitForPackage => {
                self.wait_for_artifact(self.collaborators.package.as_ref(), reporter, cancel)
                    .await
            }
            StepKind::WaitForImage => {
                self.wait_for_artifact(self.collaborators.image.as_ref(), reporter, cancel)
                    .await
            }
        };

        result.unwrap_or_else(|error| ExecutionResult::Failed { error })
    }

    async fn build_recipes(&self, reporter: &StepReporter) -> ReleaseResult<ExecutionResult> {
        let targets = &self.config.recipe_targets;
        let recipes = &self.collaborators.recipes;

        // Only checks the justfile exists, so dry runs do it too
        recipes.prepare().await?;

        for (i, target) in targets.iter().enumerate() {
            reporter.progress(i + 1, targets.len(), Some(target.as_str()));
            if self.config.dry_run {
                reporter.message(format!("Would run: just {}", target));
            } else {
                recipes.run(target).await?;
            }
        }

        Ok(done(format!("{} recipe(s)", targets.len())))
    }

    async fn changelog(&self, reporter: &StepReporter) -> ReleaseResult<ExecutionResult> {
        let config = &self.config;
        let entries = self
            .collaborators
            .changelog
            .gather(config.previous_tag.as_deref(), "HEAD", reporter)
            .await?;
        let section = render_section(&config.tag, &entries);
        let path = config.changelog_relative();

        if config.dry_run {
            reporter.message(format!(
                "Would prepend section for {} ({}) to {}",
                config.tag,
                entries.describe(),
                path.display()
            ));
            for line in section.lines().filter(|l| !l.is_empty()) {
                reporter.message(format!("  {}", line));
            }
        } else {
            write_changelog(&config.changelog_path, &section)?;
            debug!("Wrote changelog section to {}", config.changelog_path.display());
        }

        Ok(done(format!("{} -> {}", entries.describe(), path.display())))
    }

    async fn commit_and_tag(&self, reporter: &StepReporter) -> ReleaseResult<ExecutionResult> {
        let config = &self.config;
        let vcs = &self.collaborators.vcs;
        let path = config.changelog_relative();
        let message = commit_message(&config.tag);
        let tag_message = tag_message(&config.tag);

        if config.dry_run {
            reporter.message(format!("Would commit {} with message \"{}\"", path.display(), message));
            reporter.message(format!("Would create tag {} (\"{}\")", config.tag, tag_message));
            return Ok(done(format!("tag {}", config.tag)));
        }

        reporter.progress(1, 3, Some("stage changelog"));
        vcs.add(std::slice::from_ref(&path)).await?;
        reporter.progress(2, 3, Some("commit"));
        vcs.commit(&message).await?;
        reporter.progress(3, 3, Some("tag"));
        vcs.create_tag(&config.tag, &tag_message).await?;

        Ok(done(format!("tagged {}", config.tag)))
    }

    async fn push(&self, reporter: &StepReporter) -> ReleaseResult<ExecutionResult> {
        let config = &self.config;
        let refspecs = [
            format!("refs/heads/{}", config.branch),
            format!("refs/tags/{}", config.tag),
        ];

        for (i, refspec) in refspecs.iter().enumerate() {
            reporter.progress(i + 1, refspecs.len(), Some(refspec.as_str()));
            if config.dry_run {
                reporter.message(format!("Would push {} to {}", refspec, config.remote));
            } else {
                self.collaborators.vcs.push(&config.remote, refspec).await?;
            }
        }

        Ok(done(format!(
            "{} and {} -> {}",
            config.branch, config.tag, config.remote
        )))
    }

    async fn wait_for_ci(
        &self,
        reporter: &StepReporter,
        cancel: &CancelSignal,
    ) -> ReleaseResult<ExecutionResult> {
        let config = &self.config;
        let Some(ci) = &self.collaborators.ci else {
            return Ok(ExecutionResult::Skipped {
                reason: "no CI client".to_string(),
            });
        };

        let triggers = load_workflow_triggers(&config.repo_root, &config.workflows_dir)?;
        let expected: Vec<String> = triggered_by_tag(&triggers, &config.tag)
            .into_iter()
            .map(|t| t.name.clone())
            .collect();

        let scope = if expected.is_empty() {
            "all workflow runs".to_string()
        } else {
            format!("{} tag-push workflow(s): {}", expected.len(), expected.join(", "))
        };

        if config.dry_run {
            reporter.message(format!(
                "Would wait up to {}s for {} on {} (every {}s)",
                config.ci_wait.timeout.as_secs(),
                scope,
                config.tag,
                config.ci_wait.interval.as_secs()
            ));
            return Ok(done(scope));
        }

        let sha = self.collaborators.vcs.rev_parse(&config.tag).await?;
        reporter.message(format!("Waiting for {} on {}", scope, short(&sha)));

        let check = CiCompletionCheck::new(ci.clone(), sha, expected, reporter.clone());
        let summary = wait_until_ready(&check, config.ci_wait, cancel).await?;

        Ok(done(format!(
            "{} succeeded after {}s",
            scope,
            summary.elapsed.as_secs()
        )))
    }

    async fn wait_for_artifact(
        &self,
        check: Option<&Arc<dyn ReadinessCheck>>,
        reporter: &StepReporter,
        cancel: &CancelSignal,
    ) -> ReleaseResult<ExecutionResult> {
        let Some(check) = check else {
            return Err(ReleaseError::Config("no availability check configured".to_string()));
        };
        let options: WaitOptions = self.config.artifact_wait;

        if self.config.dry_run {
            reporter.message(format!(
                "Would wait up to {}s for {} (every {}s)",
                options.timeout.as_secs(),
                check.resource(),
                options.interval.as_secs()
            ));
            return Ok(done(check.resource()));
        }

        reporter.message(format!("Waiting for {}", check.resource()));
        let summary = wait_until_ready(check.as_ref(), options, cancel).await?;

        Ok(done(format!(
            "{} available after {} check(s)",
            check.resource(),
            summary.attempts
        )))
    }
}

fn done(detail: impl Into<String>) -> ExecutionResult {
    ExecutionResult::Done {
        detail: Some(detail.into()),
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

pub fn commit_message(tag: &str) -> String {
    format!("changelog: release {}", tag)
}

pub fn tag_message(tag: &str) -> String {
    format!("Release {}", tag)
}
