// src/cache/mod.rs

//! Run result cache.
//!
//! - [`delta`] holds the pure (added, removed) computation.
//! - [`store`] holds the identity-keyed cache that merges each cycle.

pub mod delta;
pub mod store;

pub use delta::{compute_delta, CacheDelta, DeltaPair};
pub use store::{CacheSnapshot, CycleResults, RunResultCache};
