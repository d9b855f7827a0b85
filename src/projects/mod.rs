// src/projects/mod.rs

//! Project graph: which project owns a changed file and which projects must
//! be rebuilt after it.

pub mod graph;

pub use graph::ProjectGraph;
