// src/bus/mod.rs

//! Typed publish/subscribe message bus.
//!
//! All engine components talk to each other through [`MessageBus`]:
//! - [`message`] defines the closed [`Message`] enum and its [`MessageKind`] tag.
//! - [`consumer`] defines the [`Consumer`] trait (plus a closure adapter).
//! - [`hub`] implements registration and serialized, failure-isolated dispatch.

pub mod consumer;
pub mod hub;
pub mod message;

pub use consumer::{ConsumeFuture, Consumer, Delivery, FnConsumer, Handled};
pub use hub::{ConsumerFailure, DispatchReport, MessageBus, SubscriptionId};
pub use message::{
    AbortMessage, FileChangeMessage, InformationType, LiveTestStatus, Message, MessageKind,
    ProjectChangeMessage, RunFinishedMessage, RunInformation, RunStartedMessage,
};
