//! Plain markdown rendering of changelog sections

use crate::changelog::source::ChangelogEntries;
use crate::core::error::ReleaseResult;
use std::fmt::Write as _;
use std::path::Path;

/// Render the `## {tag}` section for a release
pub fn render_section(tag: &str, entries: &ChangelogEntries) -> String {
    let mut out = format!("## {}\n\n", tag);

    match entries {
        ChangelogEntries::PullRequests(prs) => {
            for pr in prs {
                let _ = writeln!(out, "- {} (#{}) by @{}", pr.title, pr.number, pr.author);
            }
        }
        ChangelogEntries::Commits(commits) => {
            for commit in commits {
                let _ = writeln!(out, "- {} ({})", commit.subject, commit.short_sha());
            }
        }
    }

    out
}

/// Put `section` on top of the existing changelog, separated by a blank line
pub fn prepend_section(section: &str, existing: &str) -> String {
    let mut out = section.trim().to_string();
    out.push('\n');
    if !existing.is_empty() {
        out.push('\n');
        out.push_str(existing);
    }
    out
}

/// Prepend `section` to the file at `path`, creating it if needed. Returns the new content.
pub fn write_changelog(path: &Path, section: &str) -> ReleaseResult<String> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let content = prepend_section(section, &existing);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &content)?;
    Ok(content)
}
