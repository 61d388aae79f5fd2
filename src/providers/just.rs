//! Build recipes via the `just` command runner

use crate::core::error::{ReleaseError, ReleaseResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Runs named build recipes before a release is committed
#[async_trait]
pub trait RecipeRunner: Send + Sync {
    /// Check that recipes can run at all (e.g. the justfile exists)
    async fn prepare(&self) -> ReleaseResult<()>;

    /// Run one recipe to completion
    async fn run(&self, target: &str) -> ReleaseResult<()>;
}

/// [`RecipeRunner`] that shells out to `just <target>`
#[derive(Debug, Clone)]
pub struct JustRunner {
    working_dir: PathBuf,
    binary: String,
}

impl JustRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            binary: "just".to_string(),
        }
    }

    /// Use a different `just` executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn find_justfile(&self) -> Option<PathBuf> {
        ["justfile", "Justfile", ".justfile"]
            .iter()
            .map(|name| self.working_dir.join(name))
            .find(|p| p.is_file())
    }
}

#[async_trait]
impl RecipeRunner for JustRunner {
    async fn prepare(&self) -> ReleaseResult<()> {
        match self.find_justfile() {
            Some(_) => Ok(()),
            None => Err(ReleaseError::NotFound(format!(
                "justfile not found in {}",
                self.working_dir.display()
            ))),
        }
    }

    async fn run(&self, target: &str) -> ReleaseResult<()> {
        info!("Running recipe: just {}", target);

        // Recipe output goes straight to the terminal
        let status = Command::new(&self.binary)
            .arg(target)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| ReleaseError::Failure(format!("Failed to execute {}: {}", self.binary, e)))?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            warn!("just {} exited with code {}", target, code);
            return Err(ReleaseError::Failure(format!(
                "recipe '{}' failed with exit code {}",
                target, code
            )));
        }
        Ok(())
    }
}
