// src/bus/consumer.rs

//! Consumer abstraction for the message bus.
//!
//! A consumer is registered for one or more [`MessageKind`]s. The bus awaits
//! each consumer in turn, so a consumer that returns from `consume` has
//! finished handling the message (this is what makes `Abort` blocking).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::bus::message::Message;

/// Future returned by [`Consumer::consume`].
pub type ConsumeFuture<'a> = Pin<Box<dyn Future<Output = Result<Handled>> + Send + 'a>>;

/// Per-delivery context handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    /// An overriding consumer already claimed this message. Non-overriding
    /// consumers still run, but must not apply their fallback handling.
    pub claimed: bool,
}

/// Whether a consumer took ownership of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Claimed,
    Passed,
}

/// Trait implemented by everything that listens on the bus.
pub trait Consumer: Send + Sync + 'static {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Overriding consumers are dispatched before everyone else and may claim
    /// a message.
    fn overriding(&self) -> bool {
        false
    }

    fn consume<'a>(&'a self, message: &'a Message, delivery: Delivery) -> ConsumeFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`Consumer`].
///
/// Handy for small listeners and tests.
pub struct FnConsumer<F> {
    name: String,
    overriding: bool,
    f: F,
}

impl<F> FnConsumer<F>
where
    F: Fn(&Message, Delivery) -> Result<Handled> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            overriding: false,
            f,
        }
    }

    pub fn overriding(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            overriding: true,
            f,
        }
    }
}

impl<F> Consumer for FnConsumer<F>
where
    F: Fn(&Message, Delivery) -> Result<Handled> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn overriding(&self) -> bool {
        self.overriding
    }

    fn consume<'a>(&'a self, message: &'a Message, delivery: Delivery) -> ConsumeFuture<'a> {
        let result = (self.f)(message, delivery);
        Box::pin(async move { result })
    }
}
