// src/cache/delta.rs

//! Pure delta computation between two result sets.

use std::collections::HashSet;

use crate::model::{BuildResultItem, Identified, TestResultItem};

/// How one category of results changed between two cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPair<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> Default for DeltaPair<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> DeltaPair<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute `added = new − old` and `removed = old − new` by identity.
///
/// Items present on both sides appear in neither list. Duplicate identities
/// inside `new` collapse to their first occurrence; `added` keeps the order
/// of `new` and `removed` the order of `old`.
pub fn compute_delta<T>(old: &[T], new: &[T]) -> DeltaPair<T>
where
    T: Identified + Clone,
{
    let old_keys: HashSet<T::Key> = old.iter().map(Identified::identity).collect();
    let new_keys: HashSet<T::Key> = new.iter().map(Identified::identity).collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|item| {
            let key = item.identity();
            !old_keys.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect();

    let removed = old
        .iter()
        .filter(|item| !new_keys.contains(&item.identity()))
        .cloned()
        .collect();

    DeltaPair { added, removed }
}

/// The single message a cache update produces.
///
/// With deltas disabled, `full_refresh` is set and every `added` list holds
/// the complete current set; front-ends should replace what they show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheDelta {
    pub errors: DeltaPair<BuildResultItem>,
    pub warnings: DeltaPair<BuildResultItem>,
    pub failed: DeltaPair<TestResultItem>,
    pub ignored: DeltaPair<TestResultItem>,
    pub full_refresh: bool,
}

impl CacheDelta {
    pub fn is_empty(&self) -> bool {
        !self.full_refresh
            && self.errors.is_empty()
            && self.warnings.is_empty()
            && self.failed.is_empty()
            && self.ignored.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunnerKind, TestOutcome};

    fn failed(name: &str) -> TestResultItem {
        TestResultItem::new("a.dll", RunnerKind::NUnit, name, TestOutcome::Failed)
    }

    #[test]
    fn partitions_by_identity() {
        let old = vec![failed("T1"), failed("T2")];
        let new = vec![failed("T2"), failed("T3")];

        let delta = compute_delta(&old, &new);

        assert_eq!(delta.added, vec![failed("T3")]);
        assert_eq!(delta.removed, vec![failed("T1")]);
    }

    #[test]
    fn identity_ignores_message_changes() {
        let old = vec![failed("T1").with_message("expected 1")];
        let new = vec![failed("T1").with_message("expected 2")];
        assert!(compute_delta(&old, &new).is_empty());
    }

    #[test]
    fn duplicate_new_items_are_added_once() {
        let delta = compute_delta(&[], &[failed("T1"), failed("T1")]);
        assert_eq!(delta.added.len(), 1);
    }
}
