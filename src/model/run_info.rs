// src/model/run_info.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::model::changes::ProjectRef;
use crate::types::RunnerKind;

/// What to run for one test assembly.
///
/// - `tests` holds per-runner-kind name subsets; an empty subset means "run
///   everything in the assembly".
/// - `only_specified` marks runner kinds for which the assembly must be skipped
///   entirely when no names are listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunInfo {
    assembly: PathBuf,
    project: Option<ProjectRef>,
    tests: BTreeMap<RunnerKind, Vec<String>>,
    only_specified: BTreeSet<RunnerKind>,
}

impl TestRunInfo {
    pub fn new(assembly: impl Into<PathBuf>, project: Option<ProjectRef>) -> Self {
        Self {
            assembly: assembly.into(),
            project,
            tests: BTreeMap::new(),
            only_specified: BTreeSet::new(),
        }
    }

    pub fn assembly(&self) -> &Path {
        &self.assembly
    }

    pub fn project(&self) -> Option<&ProjectRef> {
        self.project.as_ref()
    }

    /// Framework tag of the owning project, or `""`.
    pub fn framework(&self) -> &str {
        self.project
            .as_ref()
            .map(|p| p.framework.as_str())
            .unwrap_or("")
    }

    pub fn add_test(&mut self, kind: RunnerKind, name: impl Into<String>) {
        let names = self.tests.entry(kind).or_default();
        let name = name.into();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn with_tests<I, S>(mut self, kind: RunnerKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_test(kind, name);
        }
        self
    }

    pub fn only_run_specified_for(mut self, kind: RunnerKind) -> Self {
        self.only_specified.insert(kind);
        self
    }

    /// No name subsets and no restrictions: the whole assembly runs.
    pub fn runs_whole_assembly(&self) -> bool {
        self.tests.values().all(Vec::is_empty) && self.only_specified.is_empty()
    }

    /// Widen this entry to also cover what `other` asks for.
    ///
    /// A whole-assembly request on either side wins; otherwise the name
    /// subsets and the only-specified kinds are unioned.
    pub fn absorb(&mut self, other: TestRunInfo) {
        if self.project.is_none() {
            self.project = other.project.clone();
        }
        if self.runs_whole_assembly() {
            return;
        }
        if other.runs_whole_assembly() {
            self.tests.clear();
            self.only_specified.clear();
            return;
        }
        for (kind, names) in other.tests {
            for name in names {
                self.add_test(kind, name);
            }
        }
        self.only_specified.extend(other.only_specified);
    }

    /// Names to run for `kind`, including the `Any` subset.
    pub fn tests_for(&self, kind: RunnerKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .tests
            .get(&RunnerKind::Any)
            .cloned()
            .unwrap_or_default();
        if kind != RunnerKind::Any {
            for name in self.tests.get(&kind).into_iter().flatten() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    pub fn only_runs_specified_for(&self, kind: RunnerKind) -> bool {
        self.only_specified.contains(&kind) || self.only_specified.contains(&RunnerKind::Any)
    }

    /// True when this entry must not be dispatched to a runner of `kind`.
    pub fn skipped_by(&self, kind: RunnerKind) -> bool {
        self.only_runs_specified_for(kind) && self.tests_for(kind).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_subset_applies_to_every_runner() {
        let info = TestRunInfo::new("/bin/a.dll", None)
            .with_tests(RunnerKind::Any, ["A.T1"])
            .with_tests(RunnerKind::NUnit, ["A.T2", "A.T1"]);
        assert_eq!(info.tests_for(RunnerKind::NUnit), vec!["A.T1", "A.T2"]);
        assert_eq!(info.tests_for(RunnerKind::Any), vec!["A.T1"]);
    }

    #[test]
    fn only_specified_with_no_names_is_skipped() {
        let info = TestRunInfo::new("/bin/a.dll", None).only_run_specified_for(RunnerKind::NUnit);
        assert!(info.skipped_by(RunnerKind::NUnit));

        let info = info.with_tests(RunnerKind::NUnit, ["A.T1"]);
        assert!(!info.skipped_by(RunnerKind::NUnit));
    }

    #[test]
    fn absorb_unions_named_subsets() {
        let mut info = TestRunInfo::new("/bin/a.dll", None)
            .with_tests(RunnerKind::NUnit, ["A.T1"])
            .only_run_specified_for(RunnerKind::NUnit);
        info.absorb(
            TestRunInfo::new("/bin/a.dll", Some(ProjectRef::new("A", "")))
                .with_tests(RunnerKind::NUnit, ["A.T2", "A.T1"]),
        );
        assert_eq!(info.tests_for(RunnerKind::NUnit), vec!["A.T1", "A.T2"]);
        assert!(info.only_runs_specified_for(RunnerKind::NUnit));
        assert_eq!(info.project().map(|p| p.name.as_str()), Some("A"));

        info.absorb(TestRunInfo::new("/bin/a.dll", None));
        assert!(info.runs_whole_assembly());
    }

    #[test]
    fn framework_defaults_to_empty() {
        let info = TestRunInfo::new("/bin/a.dll", None);
        assert_eq!(info.framework(), "");
        let info = TestRunInfo::new("/bin/a.dll", Some(ProjectRef::new("Core", "v4.0")));
        assert_eq!(info.framework(), "v4.0");
    }
}
