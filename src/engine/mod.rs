// src/engine/mod.rs

//! Run orchestration for watchtest.
//!
//! This module ties together:
//! - the run queue (what happens when changes arrive while a cycle runs)
//! - the cycle pipeline: plan, build, test, cache, report
//! - the coordinator worker that runs cycles one at a time and honours abort
//! - [`Engine`], which wires the watcher and consumers to one bus
//!
//! A cycle always publishes `RunStarted` first and `RunFinished` last; the
//! cache delta for the cycle, if any, comes right before `RunFinished`.

pub mod context;
pub mod coordinator;
pub mod cycle;
pub mod queue;

pub use context::{Engine, EngineContext};
pub use coordinator::RunCoordinator;
pub use cycle::CyclePipeline;
pub use queue::{RunQueue, RunRequest};
