// src/cache/store.rs

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::cache::delta::{compute_delta, CacheDelta, DeltaPair};
use crate::errors::{Result, WatchtestError};
use crate::model::{
    BuildResultItem, BuildRunResults, Identified, TestResultItem, TestRunResults,
};
use crate::types::{RunnerKind, Severity, TestOutcome};

/// Results gathered by one run cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleResults {
    pub builds: Vec<BuildRunResults>,
    pub tests: Vec<TestRunResults>,
}

impl CycleResults {
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty() && self.tests.is_empty()
    }
}

/// Read-only copy of everything the cache currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub errors: Vec<BuildResultItem>,
    pub warnings: Vec<BuildResultItem>,
    pub failed: Vec<TestResultItem>,
    pub ignored: Vec<TestResultItem>,
}

/// Identity-keyed arena. Each entry remembers when it was first inserted so
/// snapshots come out in a stable order.
#[derive(Debug)]
struct ResultStore<T: Identified> {
    entries: HashMap<T::Key, (u64, T)>,
}

impl<T: Identified + Clone> ResultStore<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn items_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut items: Vec<&(u64, T)> = self.entries.values().filter(|(_, t)| pred(t)).collect();
        items.sort_by_key(|(seq, _)| *seq);
        items.into_iter().map(|(_, t)| t.clone()).collect()
    }

    fn remove_where(&mut self, pred: impl Fn(&T) -> bool) {
        self.entries.retain(|_, (_, t)| !pred(t));
    }

    fn upsert(&mut self, item: T, seq: &mut u64) {
        let key = item.identity();
        match self.entries.get_mut(&key) {
            Some((_, existing)) => *existing = item,
            None => {
                *seq += 1;
                self.entries.insert(key, (*seq, item));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug)]
struct CacheState {
    builds: ResultStore<BuildResultItem>,
    tests: ResultStore<TestResultItem>,
    seq: u64,
}

/// The last known build diagnostics and failing/ignored tests.
///
/// Passed tests are never stored; they only resolve earlier failures.
/// Each update runs as one critical section; the lock is never held while
/// anything outside the cache runs.
#[derive(Debug)]
pub struct RunResultCache {
    state: Mutex<CacheState>,
    deltas_enabled: AtomicBool,
}

impl Default for RunResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Which stored test items a test run supersedes.
struct TestScope {
    assembly: PathBuf,
    runner: RunnerKind,
    names: Option<HashSet<String>>,
}

impl TestScope {
    fn from_results(results: &TestRunResults) -> Self {
        Self {
            assembly: results.assembly.clone(),
            runner: results.runner,
            names: results
                .ran_tests
                .as_ref()
                .map(|names| names.iter().cloned().collect()),
        }
    }

    fn covers(&self, item: &TestResultItem) -> bool {
        if item.assembly != self.assembly || item.runner != self.runner {
            return false;
        }
        match &self.names {
            Some(names) => names.contains(&item.display_name),
            None => true,
        }
    }
}

impl RunResultCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                builds: ResultStore::new(),
                tests: ResultStore::new(),
                seq: 0,
            }),
            deltas_enabled: AtomicBool::new(false),
        }
    }

    /// Publish (added, removed) pairs instead of the full set on every cycle.
    pub fn enable_deltas(&self) {
        self.deltas_enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable_deltas(&self) {
        self.deltas_enabled.store(false, Ordering::SeqCst);
    }

    pub fn deltas_enabled(&self) -> bool {
        self.deltas_enabled.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|e| WatchtestError::LockPoisoned(format!("run result cache: {e}")))
    }

    /// Merge one cycle's results and return what changed.
    ///
    /// A cycle only supersedes what it observed: build items of the projects
    /// it built and test items of the assemblies (or named tests) it ran.
    pub fn apply_cycle(&self, cycle: &CycleResults) -> Result<CacheDelta> {
        let mut state = self.lock()?;
        let mut delta = CacheDelta::default();

        if !cycle.builds.is_empty() {
            let projects: HashSet<&str> =
                cycle.builds.iter().map(|b| b.project.as_str()).collect();
            let in_scope = |item: &BuildResultItem| projects.contains(item.project.as_str());

            let old = state.builds.items_where(&in_scope);
            let new = last_by_identity(
                cycle
                    .builds
                    .iter()
                    .flat_map(|b| b.items.iter().cloned()),
            );

            delta.errors = severity_delta(&old, &new, Severity::Error);
            delta.warnings = severity_delta(&old, &new, Severity::Warning);

            state.builds.remove_where(&in_scope);
            let CacheState { builds, seq, .. } = &mut *state;
            for item in new {
                builds.upsert(item, seq);
            }
        }

        if !cycle.tests.is_empty() {
            let scopes: Vec<TestScope> = cycle.tests.iter().map(TestScope::from_results).collect();
            let in_scope = |item: &TestResultItem| scopes.iter().any(|s| s.covers(item));

            let old = state.tests.items_where(&in_scope);
            // A later report of the same test supersedes an earlier one, even
            // when the later one passed.
            let new: Vec<TestResultItem> =
                last_by_identity(cycle.tests.iter().flat_map(|t| t.items.iter().cloned()))
                    .into_iter()
                    .filter(|i| i.outcome != TestOutcome::Passed)
                    .collect();

            delta.failed = outcome_delta(&old, &new, TestOutcome::Failed);
            delta.ignored = outcome_delta(&old, &new, TestOutcome::Ignored);

            state.tests.remove_where(&in_scope);
            let CacheState { tests, seq, .. } = &mut *state;
            for item in new {
                tests.upsert(item, seq);
            }
        }

        debug!(
            builds = state.builds.len(),
            tests = state.tests.len(),
            "run result cache updated"
        );

        if self.deltas_enabled() {
            Ok(delta)
        } else {
            Ok(full_refresh(&state))
        }
    }

    pub fn snapshot(&self) -> Result<CacheSnapshot> {
        let state = self.lock()?;
        Ok(CacheSnapshot {
            errors: state.builds.items_where(|i| i.severity == Severity::Error),
            warnings: state.builds.items_where(|i| i.severity == Severity::Warning),
            failed: state.tests.items_where(|i| i.outcome == TestOutcome::Failed),
            ignored: state.tests.items_where(|i| i.outcome == TestOutcome::Ignored),
        })
    }

    /// Drop everything; returns the removals so front-ends can update.
    pub fn clear(&self) -> Result<CacheDelta> {
        let mut state = self.lock()?;
        let delta = removal_delta(&state, |_| true, |_| true);
        state.builds.remove_where(|_| true);
        state.tests.remove_where(|_| true);
        info!("run result cache cleared");
        Ok(delta)
    }

    /// Drop build items, optionally only for one project.
    pub fn clear_builds(&self, project: Option<&str>) -> Result<CacheDelta> {
        let mut state = self.lock()?;
        let matches = |item: &BuildResultItem| project.is_none_or(|p| item.project == p);
        let delta = removal_delta(&state, matches, |_| false);
        state.builds.remove_where(matches);
        Ok(delta)
    }
}

/// One item per identity: the last one reported, at the position where the
/// identity first appeared.
fn last_by_identity<T: Identified>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut index: HashMap<T::Key, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for item in items {
        match index.get(&item.identity()) {
            Some(&i) => out[i] = item,
            None => {
                index.insert(item.identity(), out.len());
                out.push(item);
            }
        }
    }
    out
}

fn severity_delta(
    old: &[BuildResultItem],
    new: &[BuildResultItem],
    severity: Severity,
) -> DeltaPair<BuildResultItem> {
    let pick = |items: &[BuildResultItem]| -> Vec<BuildResultItem> {
        items
            .iter()
            .filter(|i| i.severity == severity)
            .cloned()
            .collect()
    };
    compute_delta(&pick(old), &pick(new))
}

fn outcome_delta(
    old: &[TestResultItem],
    new: &[TestResultItem],
    outcome: TestOutcome,
) -> DeltaPair<TestResultItem> {
    let pick = |items: &[TestResultItem]| -> Vec<TestResultItem> {
        items
            .iter()
            .filter(|i| i.outcome == outcome)
            .cloned()
            .collect()
    };
    compute_delta(&pick(old), &pick(new))
}

fn full_refresh(state: &CacheState) -> CacheDelta {
    let added = |items| DeltaPair {
        added: items,
        removed: Vec::new(),
    };
    CacheDelta {
        errors: added(state.builds.items_where(|i| i.severity == Severity::Error)),
        warnings: added(state.builds.items_where(|i| i.severity == Severity::Warning)),
        failed: added_tests(state, TestOutcome::Failed),
        ignored: added_tests(state, TestOutcome::Ignored),
        full_refresh: true,
    }
}

fn added_tests(state: &CacheState, outcome: TestOutcome) -> DeltaPair<TestResultItem> {
    DeltaPair {
        added: state.tests.items_where(|i| i.outcome == outcome),
        removed: Vec::new(),
    }
}

fn removal_delta(
    state: &CacheState,
    builds: impl Fn(&BuildResultItem) -> bool,
    tests: impl Fn(&TestResultItem) -> bool,
) -> CacheDelta {
    let removed_builds = |severity: Severity| DeltaPair {
        added: Vec::new(),
        removed: state
            .builds
            .items_where(|i| i.severity == severity && builds(i)),
    };
    let removed_tests = |outcome: TestOutcome| DeltaPair {
        added: Vec::new(),
        removed: state.tests.items_where(|i| i.outcome == outcome && tests(i)),
    };
    CacheDelta {
        errors: removed_builds(Severity::Error),
        warnings: removed_builds(Severity::Warning),
        failed: removed_tests(TestOutcome::Failed),
        ignored: removed_tests(TestOutcome::Ignored),
        full_refresh: false,
    }
}
