//! CI workflow tag-push triggers
//!
//! Reads the `on` declaration of each workflow file and decides which
//! workflows run when a given tag is pushed.

use crate::core::error::{ReleaseError, ReleaseResult};
use glob::Pattern;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default workflow directory relative to the repository root
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// When a workflow runs, as far as tag pushes are concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTrigger {
    /// Workflow `name`, or the file stem when unnamed
    pub name: String,

    /// Path of the definition relative to the repository root
    pub path: PathBuf,

    pub runs_on_tag_push: bool,

    /// Glob patterns for tags. Empty means every tag.
    pub tag_patterns: Vec<String>,
}

impl WorkflowTrigger {
    /// Parse one workflow definition
    pub fn parse(yaml: &str, path: impl Into<PathBuf>) -> ReleaseResult<Self> {
        let path = path.into();
        let doc: Value = serde_yaml::from_str(yaml).map_err(|e| {
            ReleaseError::Config(format!("parse workflow {}: {}", path.display(), e))
        })?;

        let name = doc
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        let (runs_on_tag_push, tag_patterns) = match on_declaration(&doc) {
            Some(on) => parse_on(on),
            None => (false, Vec::new()),
        };

        Ok(Self {
            name,
            path,
            runs_on_tag_push,
            tag_patterns,
        })
    }

    /// Whether pushing `tag` fires this workflow
    pub fn matches_tag(&self, tag: &str) -> bool {
        if !self.runs_on_tag_push {
            return false;
        }
        self.tag_patterns.is_empty() || self.tag_patterns.iter().any(|p| glob_matches(p, tag))
    }
}

/// YAML 1.1 readers turn a bare `on` key into boolean true, so accept both spellings
fn on_declaration(doc: &Value) -> Option<&Value> {
    let map = doc.as_mapping()?;
    map.get("on").or_else(|| map.get(Value::Bool(true)))
}

fn is_push(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("push"))
}

fn parse_on(on: &Value) -> (bool, Vec<String>) {
    match on {
        Value::String(_) => (is_push(on), Vec::new()),
        Value::Sequence(events) => (events.iter().any(is_push), Vec::new()),
        Value::Mapping(events) => events
            .iter()
            .find(|(key, _)| is_push(key))
            .map(|(_, push)| parse_push(push))
            .unwrap_or((false, Vec::new())),
        _ => (false, Vec::new()),
    }
}

fn parse_push(push: &Value) -> (bool, Vec<String>) {
    let filters: &Mapping = match push {
        Value::Mapping(m) => m,
        Value::Sequence(_) | Value::Tagged(_) => return (false, Vec::new()),
        // `push:` with no filters runs for every branch and tag
        _ => return (true, Vec::new()),
    };

    let mut tags: Option<Vec<String>> = None;
    let mut has_branches = false;

    for (key, value) in filters {
        let Some(key) = key.as_str() else { continue };
        match key.trim().to_ascii_lowercase().as_str() {
            "tags" => tags = Some(string_list(value)),
            "branches" => has_branches = true,
            // tags-ignore, branches-ignore, paths and paths-ignore do not decide tag pushes
            _ => {}
        }
    }

    match tags {
        // Only branches filtered: tag pushes never match
        None if has_branches => (false, Vec::new()),
        // An explicit empty tag filter matches nothing
        Some(patterns) if patterns.is_empty() => (false, Vec::new()),
        Some(patterns) => (true, patterns),
        None => (true, Vec::new()),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Match a tag name against a workflow glob. `**` behaves like `*`.
pub fn glob_matches(pattern: &str, tag: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }
    match Pattern::new(&pattern.replace("**", "*")) {
        Ok(p) => p.matches(tag),
        Err(e) => {
            debug!("Ignoring invalid tag pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// All triggers that fire when `tag` is pushed
pub fn triggered_by_tag<'a>(triggers: &'a [WorkflowTrigger], tag: &str) -> Vec<&'a WorkflowTrigger> {
    triggers.iter().filter(|t| t.matches_tag(tag)).collect()
}

/// Read every `*.yml` / `*.yaml` under `dir` and keep the tag-push workflows.
///
/// `dir` is resolved against `repo_root`. A missing directory yields an
/// empty list. Files are read in name order so results are stable.
pub fn load_workflow_triggers(repo_root: &Path, dir: &Path) -> ReleaseResult<Vec<WorkflowTrigger>> {
    let full = repo_root.join(dir);
    let entries = match std::fs::read_dir(&full) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    files.sort();

    let mut triggers = Vec::new();
    for file in files {
        let contents = std::fs::read_to_string(&file)?;
        let relative = dir.join(file.file_name().unwrap_or_default());
        let trigger = WorkflowTrigger::parse(&contents, relative)?;
        debug!(
            "Workflow {} runs_on_tag_push={} patterns={:?}",
            trigger.name, trigger.runs_on_tag_push, trigger.tag_patterns
        );
        if trigger.runs_on_tag_push {
            triggers.push(trigger);
        }
    }
    Ok(triggers)
}
