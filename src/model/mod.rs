// src/model/mod.rs

//! Per-cycle data exchanged between the engine components.

pub mod changes;
pub mod results;
pub mod run_info;

pub use changes::{dedup_files, ChangedFile, ProjectRef};
pub use results::{
    BuildItemKey, BuildResultItem, BuildRunResults, Identified, RunReport, StackFrame,
    TestItemKey, TestResultItem, TestRunResults,
};
pub use run_info::TestRunInfo;
