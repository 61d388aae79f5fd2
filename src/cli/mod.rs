//! Command-line interface

pub mod commands;
pub mod display;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ChangelogCommand, CheckCommand, CiCommand, ReleaseCommand, TagCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Release automation: tag, changelog, push, and wait for CI and artifacts
#[derive(Debug, Parser, Clone)]
#[command(name = "releaser")]
#[command(version)]
#[command(about = "Release pipeline orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to release configuration file
    #[arg(short, long, global = true, default_value = crate::core::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the release pipeline
    Release(ReleaseCommand),

    /// Version tag helpers
    #[command(subcommand)]
    Tag(TagCommand),

    /// GitHub Actions workflows for a tag
    #[command(subcommand)]
    Ci(CiCommand),

    /// Package index and container registry availability
    #[command(subcommand)]
    Check(CheckCommand),

    /// Generate and prepend a changelog section
    Changelog(ChangelogCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Config path, relative paths resolved against the repository root
    pub fn config_path(&self) -> PathBuf {
        if self.config.is_absolute() {
            self.config.clone()
        } else {
            self.repo.join(&self.config)
        }
    }
}
