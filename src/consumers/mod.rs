// src/consumers/mod.rs

//! Bus consumers owned by the engine.
//!
//! - [`extension`]: provider-specific file filters that claim changes.
//! - [`project`]: the default change handler feeding the run coordinator.
//! - [`sink`]: front-end feedback (log output or a channel stream).

pub mod extension;
pub mod project;
pub mod sink;

pub use extension::{ExtensionConsumer, RunRequestSink, SinkFuture};
pub use project::ProjectChangeConsumer;
pub use sink::{ChannelSink, FeedbackSink, LogSink, SinkConsumer};
