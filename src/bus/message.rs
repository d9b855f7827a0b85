// src/bus/message.rs

//! The closed set of messages exchanged on the bus.

use std::fmt;
use std::path::PathBuf;

use crate::cache::CacheDelta;
use crate::model::{
    dedup_files, BuildRunResults, ChangedFile, RunReport, TestResultItem, TestRunResults,
};

/// A batch of changed files, already de-duplicated by path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileChangeMessage {
    files: Vec<ChangedFile>,
}

impl FileChangeMessage {
    pub fn new<I>(files: I) -> Self
    where
        I: IntoIterator<Item = ChangedFile>,
    {
        Self {
            files: dedup_files(files),
        }
    }

    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Explicit request to rebuild and retest projects.
///
/// An empty `projects` list means every known project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectChangeMessage {
    pub projects: Vec<String>,
}

impl ProjectChangeMessage {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn projects<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStartedMessage {
    pub files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFinishedMessage {
    pub report: RunReport,
}

/// Progress of the test phase, published before each runner group starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveTestStatus {
    /// First assembly of the group about to run.
    pub current_assembly: PathBuf,
    /// 1-based index of the group about to run.
    pub current_group: usize,
    pub total_groups: usize,
    /// Test results collected by earlier groups of this cycle.
    pub tests_completed: usize,
    pub failed_tests: Vec<TestResultItem>,
}

/// Which step of a cycle is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationType {
    PreProcessing,
    Build,
    TestRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInformation {
    pub kind: InformationType,
    pub project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbortMessage {
    pub reason: String,
}

impl AbortMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Every message the bus can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    FileChange(FileChangeMessage),
    ProjectChange(ProjectChangeMessage),
    RunStarted(RunStartedMessage),
    RunFinished(RunFinishedMessage),
    LiveTestStatus(LiveTestStatus),
    RunInformation(RunInformation),
    CacheDelta(CacheDelta),
    Error(String),
    Warning(String),
    Information(String),
    Abort(AbortMessage),
    BuildRun(BuildRunResults),
    TestRun(TestRunResults),
}

/// Fieldless mirror of [`Message`], used to register consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    FileChange,
    ProjectChange,
    RunStarted,
    RunFinished,
    LiveTestStatus,
    RunInformation,
    CacheDelta,
    Error,
    Warning,
    Information,
    Abort,
    BuildRun,
    TestRun,
}

impl MessageKind {
    pub const ALL: [MessageKind; 13] = [
        MessageKind::FileChange,
        MessageKind::ProjectChange,
        MessageKind::RunStarted,
        MessageKind::RunFinished,
        MessageKind::LiveTestStatus,
        MessageKind::RunInformation,
        MessageKind::CacheDelta,
        MessageKind::Error,
        MessageKind::Warning,
        MessageKind::Information,
        MessageKind::Abort,
        MessageKind::BuildRun,
        MessageKind::TestRun,
    ];
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::FileChange(_) => MessageKind::FileChange,
            Message::ProjectChange(_) => MessageKind::ProjectChange,
            Message::RunStarted(_) => MessageKind::RunStarted,
            Message::RunFinished(_) => MessageKind::RunFinished,
            Message::LiveTestStatus(_) => MessageKind::LiveTestStatus,
            Message::RunInformation(_) => MessageKind::RunInformation,
            Message::CacheDelta(_) => MessageKind::CacheDelta,
            Message::Error(_) => MessageKind::Error,
            Message::Warning(_) => MessageKind::Warning,
            Message::Information(_) => MessageKind::Information,
            Message::Abort(_) => MessageKind::Abort,
            Message::BuildRun(_) => MessageKind::BuildRun,
            Message::TestRun(_) => MessageKind::TestRun,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::Error(text.into())
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Message::Warning(text.into())
    }

    pub fn information(text: impl Into<String>) -> Self {
        Message::Information(text.into())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_change_batches_are_deduplicated() {
        let msg = FileChangeMessage::new(vec![
            ChangedFile::new("/p/a.php"),
            ChangedFile::new("/p/a.php"),
            ChangedFile::new("/p/b.txt"),
        ]);
        assert_eq!(msg.files().len(), 2);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Message::warning("x").kind(), MessageKind::Warning);
        assert_eq!(
            Message::Abort(AbortMessage::new("user")).kind(),
            MessageKind::Abort
        );
        assert_eq!(MessageKind::ALL.len(), 13);
    }
}
