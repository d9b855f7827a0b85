// src/build/mod.rs

//! Project builds.
//!
//! - [`plan`] decides which projects a change batch rebuilds, honouring the
//!   optional optimistic predicate.
//! - [`runner`] invokes the build program for one project.
//! - [`parser`] turns compiler output into diagnostics.

pub mod parser;
pub mod plan;
pub mod runner;

pub use parser::parse_diagnostics;
pub use plan::{edits_only_strategy, BuildPlanner, OptimisticStrategy, VersionedChange};
pub use runner::BuildRunner;
