// src/projects/graph.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::{EngineConfig, ProjectConfig};
use crate::errors::{Result, WatchtestError};
use crate::model::{ProjectRef, TestRunInfo};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::PatternSet;

/// One project plus its compiled ownership patterns and adjacency.
#[derive(Debug, Clone)]
struct ProjectNode {
    config: ProjectConfig,
    owns: PatternSet,
    /// Projects this one references.
    deps: Vec<String>,
    /// Projects that reference this one.
    dependents: Vec<String>,
}

/// The configured projects and their reference edges.
///
/// Reference cycles are rejected by config validation; the graph re-checks
/// when computing a build order and reports [`WatchtestError::DependencyCycle`].
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    root: PathBuf,
    /// Declaration order, used to break ties in the build order.
    order: Vec<String>,
    nodes: HashMap<String, ProjectNode>,
}

impl ProjectGraph {
    pub fn from_config(cfg: &EngineConfig, root: &Path) -> Result<Self> {
        let mut nodes: HashMap<String, ProjectNode> = HashMap::new();
        let mut order = Vec::with_capacity(cfg.projects.len());

        for project in &cfg.projects {
            let owns = ownership_patterns(project, root).with_context(|| {
                format!("compiling watch patterns for project '{}'", project.name)
            })?;
            order.push(project.name.clone());
            nodes.insert(
                project.name.clone(),
                ProjectNode {
                    config: project.clone(),
                    owns,
                    deps: project.references.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        for name in &order {
            let deps = nodes.get(name).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                let node = nodes
                    .get_mut(&dep)
                    .ok_or_else(|| WatchtestError::ProjectNotFound(dep.clone()))?;
                node.dependents.push(name.clone());
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            order,
            nodes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All project names in declaration order.
    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.nodes.get(name).map(|n| &n.config)
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Projects owning `path` (a file may belong to several).
    pub fn projects_for_file(&self, path: &Path) -> Vec<&str> {
        let Some(rel) = relative_str(&self.root, path) else {
            return Vec::new();
        };
        self.order
            .iter()
            .filter(|name| self.nodes.get(*name).is_some_and(|n| n.owns.matches(&rel)))
            .map(String::as_str)
            .collect()
    }

    /// `names` plus every project that transitively references one of them.
    pub fn with_dependents<'a, I>(&self, names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = BTreeSet::new();
        let mut stack: Vec<&str> = names.into_iter().collect();
        while let Some(name) = stack.pop() {
            if !self.nodes.contains_key(name) || !out.insert(name.to_string()) {
                continue;
            }
            stack.extend(self.dependents_of(name).iter().map(String::as_str));
        }
        out
    }

    /// Every project that transitively depends on `name` (excluding itself).
    pub fn downstream_of(&self, name: &str) -> BTreeSet<String> {
        let mut all = self.with_dependents(self.dependents_of(name).iter().map(String::as_str));
        all.remove(name);
        all
    }

    /// Sort `names` so references build before the projects using them.
    pub fn build_order(&self, names: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.order.iter().filter(|n| names.contains(*n)) {
            graph.add_node(name.as_str());
        }
        for name in self.order.iter().filter(|n| names.contains(*n)) {
            for dep in self.dependencies_of(name) {
                if names.contains(dep) {
                    graph.add_edge(dep.as_str(), name.as_str(), ());
                }
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            WatchtestError::DependencyCycle(format!(
                "project references form a cycle involving '{}'",
                cycle.node_id()
            ))
        })?;
        debug!(order = ?sorted, "computed build order");
        Ok(sorted.into_iter().map(str::to_string).collect())
    }

    /// Test run info for a project's test assembly, if it has one.
    pub fn test_info(&self, name: &str) -> Option<TestRunInfo> {
        let config = self.project(name)?;
        let assembly = config.assembly.as_ref()?;
        Some(TestRunInfo::new(
            assembly.clone(),
            Some(ProjectRef::new(config.name.clone(), config.framework.clone())),
        ))
    }
}

/// Explicit `watch` globs, or everything below the project file's directory.
fn ownership_patterns(project: &ProjectConfig, root: &Path) -> anyhow::Result<PatternSet> {
    if !project.watch.is_empty() {
        return PatternSet::new(&project.watch);
    }

    let dir = project.file.parent().unwrap_or(Path::new(""));
    match relative_str(root, dir) {
        Some(rel) if rel.is_empty() => PatternSet::new(&["**"]),
        Some(rel) => PatternSet::new(&[format!("{rel}/**")]),
        None => Ok(PatternSet::empty()),
    }
}
