//! Changelog generation
//!
//! Entries are gathered from git history or merged pull requests, rendered
//! into a `## {tag}` section and prepended to the changelog file.

pub mod cache;
pub mod render;
pub mod source;

pub use cache::PrCache;
pub use render::{prepend_section, render_section, write_changelog};
pub use source::{ChangelogEntries, ChangelogSource, GitHubPrSource, GitLogSource};
