// src/exec/mod.rs

//! Process execution layer.
//!
//! Build tools and test runners are plain external processes. This module
//! owns the [`ProcessBackend`] seam through which they are started, and the
//! production implementation on top of `tokio::process`.

pub mod backend;

pub use backend::{ProcessBackend, ProcessError, ProcessFuture, ProcessOutput, ProcessSpec, TokioProcessBackend};
