//! Semantic version tags and next-tag resolution
//!
//! Accepted tag forms are `v?X.Y.Z`, `v?X.Y.ZrcN` and `v?X.Y.ZaN`. Anything
//! else is not a version and is ignored by the resolver. Stable tags produced
//! here carry a leading `v`; prereleases are rendered without it.

use crate::core::error::{ReleaseError, ReleaseResult};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:(rc|a)(\d+))?$").expect("tag regex is valid")
    })
}

/// Prerelease marker. `Rc` sorts above `Alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreKind {
    Alpha,
    Rc,
}

impl PreKind {
    fn marker(self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Rc => "rc",
        }
    }
}

/// Prerelease kind plus its number, e.g. `rc3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prerelease {
    pub kind: PreKind,
    pub num: u64,
}

/// An immutable semantic version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<Prerelease>,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// First release used when no stable tag exists yet
    pub const INITIAL: Version = Version::new(1, 0, 0);

    /// Parse a tag string. Returns `None` for anything that is not a version.
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = tag_regex().captures(tag.trim())?;
        let num = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();

        let pre = match caps.get(4).map(|m| m.as_str()) {
            Some("rc") => Some(Prerelease {
                kind: PreKind::Rc,
                num: num(5)?,
            }),
            Some("a") => Some(Prerelease {
                kind: PreKind::Alpha,
                num: num(5)?,
            }),
            _ => None,
        };

        Some(Self {
            major: num(1)?,
            minor: num(2)?,
            patch: num(3)?,
            pre,
        })
    }

    pub fn is_stable(&self) -> bool {
        self.pre.is_none()
    }

    pub fn pre_kind(&self) -> Option<PreKind> {
        self.pre.map(|p| p.kind)
    }

    /// Same version with the prerelease stripped
    pub fn base(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    pub fn next_patch(&self) -> ReleaseResult<Self> {
        Ok(Self::new(self.major, self.minor, increment(self.patch, "patch")?))
    }

    pub fn next_minor(&self) -> ReleaseResult<Self> {
        Ok(Self::new(self.major, increment(self.minor, "minor")?, 0))
    }

    pub fn next_major(&self) -> ReleaseResult<Self> {
        Ok(Self::new(increment(self.major, "major")?, 0, 0))
    }

    /// Next rc on this base: `rc0`, or one past `existing` when rcs already exist
    pub fn next_rc(&self, existing: Option<u64>) -> ReleaseResult<Self> {
        self.next_pre(PreKind::Rc, existing)
    }

    /// Next alpha on this base
    pub fn next_alpha(&self, existing: Option<u64>) -> ReleaseResult<Self> {
        self.next_pre(PreKind::Alpha, existing)
    }

    fn next_pre(&self, kind: PreKind, existing: Option<u64>) -> ReleaseResult<Self> {
        let num = match existing {
            Some(n) => increment(n, "prerelease")?,
            None => 0,
        };
        Ok(Self {
            pre: Some(Prerelease { kind, num }),
            ..self.base()
        })
    }

    /// Render as a tag: `vX.Y.Z` for stable, `X.Y.ZrcN` / `X.Y.ZaN` otherwise
    pub fn to_tag(&self) -> String {
        if self.is_stable() {
            format!("v{}", self)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.marker(), pre.num)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre, other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Which kind of version bump to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BumpKind {
    #[default]
    Patch,
    Minor,
    Major,
    Rc,
    Alpha,
}

impl BumpKind {
    /// Build a bump from command-line flags, rejecting conflicting combinations
    pub fn from_flags(rc: bool, alpha: bool, release: bool, major: bool) -> ReleaseResult<Self> {
        if rc && alpha {
            return Err(ReleaseError::Validation(
                "cannot use both --rc and --alpha".to_string(),
            ));
        }
        if (release || major) && (rc || alpha) {
            return Err(ReleaseError::Validation(
                "cannot combine --release/--major with --rc or --alpha".to_string(),
            ));
        }
        if major && !release {
            return Err(ReleaseError::Validation(
                "--major must be used with --release".to_string(),
            ));
        }

        Ok(match (rc, alpha, release, major) {
            (true, _, _, _) => BumpKind::Rc,
            (_, true, _, _) => BumpKind::Alpha,
            (_, _, true, true) => BumpKind::Major,
            (_, _, true, false) => BumpKind::Minor,
            _ => BumpKind::Patch,
        })
    }

    fn pre_kind(self) -> Option<PreKind> {
        match self {
            BumpKind::Rc => Some(PreKind::Rc),
            BumpKind::Alpha => Some(PreKind::Alpha),
            _ => None,
        }
    }
}

fn parsed<'a, S: AsRef<str>>(tags: &'a [S]) -> impl Iterator<Item = (&'a str, Version)> + 'a {
    tags.iter()
        .filter_map(|t| Version::parse(t.as_ref()).map(|v| (t.as_ref(), v)))
}

fn increment(component: u64, name: &str) -> ReleaseResult<u64> {
    component.checked_add(1).ok_or_else(|| {
        ReleaseError::Validation(format!("{} version {} cannot be incremented", name, component))
    })
}

/// Compute the next release tag from the existing tags
pub fn next_from_tags<S: AsRef<str>>(tags: &[S], bump: BumpKind) -> ReleaseResult<String> {
    let max_stable = parsed(tags).map(|(_, v)| v).filter(Version::is_stable).max();

    if let Some(kind) = bump.pre_kind() {
        // Highest prerelease number seen per base, for the requested kind only
        let mut existing: HashMap<Version, u64> = HashMap::new();
        for (_, v) in parsed(tags) {
            if let Some(pre) = v.pre.filter(|p| p.kind == kind) {
                let entry = existing.entry(v.base()).or_insert(pre.num);
                *entry = (*entry).max(pre.num);
            }
        }

        let first = match max_stable {
            Some(v) => v.next_patch()?,
            None => Version::INITIAL,
        };
        let base = existing
            .keys()
            .copied()
            .chain(std::iter::once(first))
            .max()
            .unwrap_or(first);

        let current = existing.get(&base).copied();
        let next = match kind {
            PreKind::Rc => base.next_rc(current)?,
            PreKind::Alpha => base.next_alpha(current)?,
        };
        return Ok(next.to_tag());
    }

    let Some(stable) = max_stable else {
        return Ok(Version::INITIAL.to_tag());
    };

    let next = match bump {
        BumpKind::Major => stable.next_major()?,
        BumpKind::Minor => stable.next_minor()?,
        _ => stable.next_patch()?,
    };
    Ok(next.to_tag())
}

/// Greatest version among the tags, preferring the caller's original spelling
pub fn latest_tag<S: AsRef<str>>(tags: &[S]) -> Option<String> {
    latest_matching(tags, |_| true)
}

/// Greatest stable version among the tags, the default previous release
pub fn latest_stable_tag<S: AsRef<str>>(tags: &[S]) -> Option<String> {
    latest_matching(tags, Version::is_stable)
}

fn latest_matching<S, F>(tags: &[S], keep: F) -> Option<String>
where
    S: AsRef<str>,
    F: Fn(&Version) -> bool,
{
    let max = parsed(tags).map(|(_, v)| v).filter(|v| keep(v)).max()?;
    let original = parsed(tags).find(|(_, v)| *v == max).map(|(s, _)| s.to_string());
    Some(original.unwrap_or_else(|| max.to_tag()))
}
