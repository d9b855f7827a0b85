// src/build/plan.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::model::ChangedFile;
use crate::projects::ProjectGraph;

/// `(changed file, previous content hash) -> only rebuild the owning project`.
///
/// The previous hash is `None` for files the engine has not seen before.
pub type OptimisticStrategy = Arc<dyn Fn(&ChangedFile, Option<&str>) -> bool + Send + Sync>;

/// Strategy used when optimistic builds are switched on in the config: an
/// edit to a file that already existed never changes the project structure.
pub fn edits_only_strategy() -> OptimisticStrategy {
    Arc::new(|_file: &ChangedFile, previous: Option<&str>| previous.is_some())
}

/// A changed file together with its content hash before the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedChange {
    pub file: ChangedFile,
    pub previous: Option<String>,
    /// The file no longer exists.
    pub removed: bool,
}

/// Decides which projects a run must build, in dependency order.
#[derive(Clone, Default)]
pub struct BuildPlanner {
    strategy: Option<OptimisticStrategy>,
}

impl fmt::Debug for BuildPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildPlanner")
            .field("optimistic", &self.strategy.is_some())
            .finish()
    }
}

impl BuildPlanner {
    pub fn new(strategy: Option<OptimisticStrategy>) -> Self {
        Self { strategy }
    }

    pub fn set_strategy(&mut self, strategy: Option<OptimisticStrategy>) {
        self.strategy = strategy;
    }

    pub fn is_optimistic(&self) -> bool {
        self.strategy.is_some()
    }

    /// Projects to build for a batch of changes plus explicitly requested
    /// projects (`all` selects every project).
    ///
    /// A project whose changed files all satisfy the optimistic predicate is
    /// built alone (deleted files never do); otherwise it is built together with every project that
    /// transitively references it. Explicit requests always include
    /// dependents. Files no project owns are ignored.
    pub fn plan(
        &self,
        graph: &ProjectGraph,
        changes: &[VersionedChange],
        explicit: &BTreeSet<String>,
        all: bool,
    ) -> Result<Vec<String>> {
        if all {
            let every: BTreeSet<String> = graph.projects().map(str::to_string).collect();
            return graph.build_order(&every);
        }

        let mut by_project: BTreeMap<&str, Vec<&VersionedChange>> = BTreeMap::new();
        for change in changes {
            let owners = graph.projects_for_file(change.file.path());
            if owners.is_empty() {
                debug!(path = ?change.file.path(), "changed file belongs to no project");
            }
            for owner in owners {
                by_project.entry(owner).or_default().push(change);
            }
        }

        let mut selected = graph.with_dependents(explicit.iter().map(String::as_str));
        for (project, project_changes) in by_project {
            let narrow = self.strategy.as_ref().is_some_and(|strategy| {
                project_changes
                    .iter()
                    .all(|c| !c.removed && strategy(&c.file, c.previous.as_deref()))
            });
            if narrow {
                debug!(project, "optimistic build: skipping dependents");
                selected.insert(project.to_string());
            } else {
                selected.extend(graph.with_dependents([project]));
            }
        }

        graph.build_order(&selected)
    }
}
