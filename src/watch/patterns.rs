// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns.
///
/// Patterns are relative to the watch root; callers pass forward-slash
/// relative paths (see [`super::path_utils::relative_str`]).
#[derive(Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    /// Patterns prefixed with `!` are exclusions.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let (excluded, included): (Vec<&str>, Vec<&str>) = patterns
            .iter()
            .map(AsRef::as_ref)
            .partition(|p| p.starts_with('!'));
        let excluded: Vec<&str> = excluded.into_iter().map(|p| &p[1..]).collect();

        let include = build_globset(&included)?;
        let exclude = if excluded.is_empty() {
            None
        } else {
            Some(build_globset(&excluded)?)
        };

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            include,
            exclude,
        })
    }

    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            include: GlobSet::empty(),
            exclude: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `rel_path` matches an include pattern and no exclusion.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude() {
        let set = PatternSet::new(&["src/**/*.cs", "!src/**/obj/**"]).unwrap();
        assert!(set.matches("src/Core/A.cs"));
        assert!(!set.matches("src/Core/obj/A.cs"));
        assert!(!set.matches("docs/readme.md"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = PatternSet::empty();
        assert!(set.is_empty());
        assert!(!set.matches("anything"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(PatternSet::new(&["src/[*.cs"]).is_err());
    }
}
