// src/watch/mod.rs

//! File watching and change detection.
//!
//! - [`watcher`] wraps a cross-platform `notify` watcher with pause/resume and
//!   publishes debounced `FileChange` messages on the bus.
//! - [`debounce`] is the pure batching logic behind it.
//! - [`patterns`] compiles the ignore and project-ownership globs.
//! - [`cache`] remembers content hashes so the build runner can hand the
//!   previous version of a file to the optimistic build predicate.

pub mod cache;
pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use cache::{compute_file_hash, FileCache, HashSwap};
pub use debounce::Debouncer;
pub use patterns::PatternSet;
pub use watcher::{DirectoryWatcher, WatchOptions, WatcherState};
