// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::model::{dedup_files, ChangedFile, TestRunInfo};
use crate::types::TriggerWhileRunningBehaviour;

/// What a run cycle should do.
///
/// Requests merge: files and project names are unioned, `all` wins, and
/// explicit test infos are unioned per assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub files: Vec<ChangedFile>,
    pub projects: BTreeSet<String>,
    pub all: bool,
    pub tests: Vec<TestRunInfo>,
}

impl RunRequest {
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = ChangedFile>,
    {
        Self {
            files: dedup_files(files),
            ..Self::default()
        }
    }

    pub fn all_projects() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn for_projects<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn for_tests(tests: Vec<TestRunInfo>) -> Self {
        Self {
            tests,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.files.is_empty() && self.projects.is_empty() && self.tests.is_empty()
    }

    pub fn merge(&mut self, other: RunRequest) {
        let files = std::mem::take(&mut self.files);
        self.files = dedup_files(files.into_iter().chain(other.files));
        self.projects.extend(other.projects);
        self.all |= other.all;
        for info in other.tests {
            match self.tests.iter_mut().find(|t| t.assembly() == info.assembly()) {
                Some(existing) => existing.absorb(info),
                None => self.tests.push(info),
            }
        }
    }
}

/// Requests that arrive while a cycle is running.
///
/// At most `max_batches` batches are kept; once full, new requests merge into
/// the newest batch so nothing is lost. The worker drains everything at once.
#[derive(Debug)]
pub struct RunQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_batches: usize,
    batches: VecDeque<RunRequest>,
}

impl RunQueue {
    /// `max_batches` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_batches: usize) -> Self {
        Self {
            behaviour,
            max_batches: max_batches.max(1),
            batches: VecDeque::new(),
        }
    }

    pub fn behaviour(&self) -> TriggerWhileRunningBehaviour {
        self.behaviour
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn record(&mut self, request: RunRequest) {
        if request.is_empty() {
            debug!("ignoring empty run request");
            return;
        }
        if self.batches.len() >= self.max_batches {
            if let Some(last) = self.batches.back_mut() {
                warn!(
                    max_batches = self.max_batches,
                    "run queue full; merging into newest batch"
                );
                last.merge(request);
                return;
            }
        }
        self.batches.push_back(request);
        debug!(batches = self.batches.len(), "queued run request");
    }

    /// Merge every queued batch into one request.
    pub fn drain(&mut self) -> Option<RunRequest> {
        let mut merged = self.batches.pop_front()?;
        while let Some(next) = self.batches.pop_front() {
            merged.merge(next);
        }
        debug!(
            files = merged.files.len(),
            projects = merged.projects.len(),
            all = merged.all,
            "drained run queue"
        );
        Some(merged)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunnerKind;

    #[test]
    fn drain_merges_batches_and_dedupes_files() {
        let mut q = RunQueue::new(TriggerWhileRunningBehaviour::Queue, 3);
        q.record(RunRequest::from_files([ChangedFile::new("/r/a.cs")]));
        q.record(RunRequest::from_files([
            ChangedFile::new("/r/a.cs"),
            ChangedFile::new("/r/b.cs"),
        ]));
        q.record(RunRequest::for_projects(["Core"]));
        assert_eq!(q.len(), 3);

        let merged = q.drain().unwrap();
        assert_eq!(merged.files.len(), 2);
        assert!(merged.projects.contains("Core"));
        assert!(q.drain().is_none());
    }

    #[test]
    fn named_tests_for_one_assembly_are_unioned() {
        let mut q = RunQueue::new(TriggerWhileRunningBehaviour::Queue, 3);
        q.record(RunRequest::for_tests(vec![TestRunInfo::new("/bin/a.dll", None)
            .with_tests(RunnerKind::NUnit, ["A.T1"])
            .only_run_specified_for(RunnerKind::NUnit)]));
        q.record(RunRequest::for_tests(vec![TestRunInfo::new("/bin/a.dll", None)
            .with_tests(RunnerKind::NUnit, ["A.T2"])
            .only_run_specified_for(RunnerKind::NUnit)]));

        let merged = q.drain().unwrap();
        assert_eq!(merged.tests.len(), 1);
        assert_eq!(merged.tests[0].tests_for(RunnerKind::NUnit), vec!["A.T1", "A.T2"]);
    }

    #[test]
    fn full_queue_merges_into_newest() {
        let mut q = RunQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record(RunRequest::for_projects(["A"]));
        q.record(RunRequest::all_projects());
        assert_eq!(q.len(), 1);
        let merged = q.drain().unwrap();
        assert!(merged.all);
        assert!(merged.projects.contains("A"));
    }

    #[test]
    fn empty_requests_are_ignored() {
        let mut q = RunQueue::new(TriggerWhileRunningBehaviour::Abort, 0);
        q.record(RunRequest::default());
        assert!(q.is_empty());
        assert_eq!(q.behaviour(), TriggerWhileRunningBehaviour::Abort);
    }
}
