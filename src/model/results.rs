// src/model/results.rs

//! Build and test outcomes produced by one run cycle.

use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{RunnerKind, Severity, TestOutcome};

/// Anything the result cache can key by identity.
pub trait Identified {
    type Key: Clone + Eq + Hash + std::fmt::Debug;

    fn identity(&self) -> Self::Key;
}

/// A single compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResultItem {
    pub project: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

/// Identity of a build diagnostic: severity is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildItemKey {
    pub project: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl BuildResultItem {
    pub fn error(project: impl Into<String>, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            file: file.into(),
            line: 0,
            column: 0,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Identified for BuildResultItem {
    type Key = BuildItemKey;

    fn identity(&self) -> BuildItemKey {
        BuildItemKey {
            project: self.project.clone(),
            file: self.file.clone(),
            line: self.line,
            column: self.column,
            message: self.message.clone(),
        }
    }
}

/// One frame of a failing test's stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub method: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

/// Outcome of a single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResultItem {
    pub assembly: PathBuf,
    pub runner: RunnerKind,
    pub display_name: String,
    pub outcome: TestOutcome,
    pub message: String,
    pub stack_trace: Vec<StackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestItemKey {
    pub assembly: PathBuf,
    pub runner: RunnerKind,
    pub display_name: String,
}

impl TestResultItem {
    pub fn new(
        assembly: impl Into<PathBuf>,
        runner: RunnerKind,
        display_name: impl Into<String>,
        outcome: TestOutcome,
    ) -> Self {
        Self {
            assembly: assembly.into(),
            runner,
            display_name: display_name.into(),
            outcome,
            message: String::new(),
            stack_trace: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Identified for TestResultItem {
    type Key = TestItemKey;

    fn identity(&self) -> TestItemKey {
        TestItemKey {
            assembly: self.assembly.clone(),
            runner: self.runner,
            display_name: self.display_name.clone(),
        }
    }
}

/// Everything one project build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRunResults {
    pub project: String,
    pub items: Vec<BuildResultItem>,
    pub elapsed: Duration,
}

impl BuildRunResults {
    pub fn new(project: impl Into<String>, items: Vec<BuildResultItem>, elapsed: Duration) -> Self {
        Self {
            project: project.into(),
            items,
            elapsed,
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.items.iter().any(BuildResultItem::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &BuildResultItem> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &BuildResultItem> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Everything one test assembly produced under one runner.
///
/// `ran_tests` is `Some` when only a named subset of the assembly was run; the
/// cache then limits its replacement scope to those names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunResults {
    pub assembly: PathBuf,
    pub runner: RunnerKind,
    pub items: Vec<TestResultItem>,
    pub ran_tests: Option<Vec<String>>,
    pub elapsed: Duration,
}

impl TestRunResults {
    pub fn new(assembly: impl Into<PathBuf>, runner: RunnerKind, items: Vec<TestResultItem>) -> Self {
        Self {
            assembly: assembly.into(),
            runner,
            items,
            ran_tests: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn assembly(&self) -> &Path {
        &self.assembly
    }

    pub fn count(&self, outcome: TestOutcome) -> usize {
        self.items.iter().filter(|i| i.outcome == outcome).count()
    }
}

/// Summary of one run cycle, handed to the feedback sink in `RunFinished`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub projects_built: usize,
    pub builds_succeeded: usize,
    pub builds_failed: usize,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_ignored: usize,
    pub aborted: bool,
}

impl RunReport {
    pub fn add_build(&mut self, results: &BuildRunResults) {
        self.projects_built += 1;
        if results.succeeded() {
            self.builds_succeeded += 1;
        } else {
            self.builds_failed += 1;
        }
    }

    pub fn add_tests(&mut self, results: &TestRunResults) {
        self.tests_run += results.items.len();
        self.tests_passed += results.count(TestOutcome::Passed);
        self.tests_failed += results.count(TestOutcome::Failed);
        self.tests_ignored += results.count(TestOutcome::Ignored);
    }

    pub fn succeeded(&self) -> bool {
        !self.aborted && self.builds_failed == 0 && self.tests_failed == 0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "Ran {} build(s) ({} succeeded, {} failed) and {} test(s) ({} passed, {} failed, {} ignored)",
            self.projects_built,
            self.builds_succeeded,
            self.builds_failed,
            self.tests_run,
            self.tests_passed,
            self.tests_failed,
            self.tests_ignored,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_identity_ignores_severity() {
        let a = BuildResultItem::error("Core", "a.cs", "boom").at(3, 4);
        let mut b = a.clone();
        b.severity = Severity::Warning;
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn report_counts_builds_and_tests() {
        let mut report = RunReport::default();
        report.add_build(&BuildRunResults::new("Core", vec![], Duration::ZERO));
        report.add_build(&BuildRunResults::new(
            "Web",
            vec![BuildResultItem::error("Web", "w.cs", "bad")],
            Duration::ZERO,
        ));
        report.add_tests(&TestRunResults::new(
            "a.dll",
            RunnerKind::NUnit,
            vec![
                TestResultItem::new("a.dll", RunnerKind::NUnit, "T1", TestOutcome::Passed),
                TestResultItem::new("a.dll", RunnerKind::NUnit, "T2", TestOutcome::Failed),
            ],
        ));

        assert_eq!(report.projects_built, 2);
        assert_eq!(report.builds_failed, 1);
        assert_eq!(report.tests_run, 2);
        assert_eq!(report.tests_failed, 1);
        assert!(!report.succeeded());
        assert!(report.summary().starts_with("Ran 2 build(s) (1 succeeded, 1 failed)"));
    }
}
