// src/runners/mod.rs

//! Test-runner orchestration.
//!
//! Given a set of [`TestRunInfo`](crate::model::TestRunInfo) entries the
//! [`orchestrator`] resolves a runner executable per framework tag
//! ([`locator`]), groups entries per runner, builds one command line per group
//! ([`command_line`], using the host [`platform`] conventions), runs it, and
//! parses the NUnit result file ([`result_file`], [`nunit_xml`]).

pub mod command_line;
pub mod locator;
pub mod nunit_xml;
pub mod orchestrator;
pub mod platform;
pub mod result_file;

pub use command_line::{build_invocation, Invocation};
pub use locator::{Resolution, RunnerGroupKey, RunnerLocator};
pub use orchestrator::{RunnerGroup, TestOrchestrator, TestRunOutcome};
pub use platform::Platform;
