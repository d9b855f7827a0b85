// src/bus/hub.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::bus::consumer::{Consumer, Delivery, Handled};
use crate::bus::message::{Message, MessageKind};

/// Handle returned by [`MessageBus::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kinds: Vec<MessageKind>,
    consumer: Arc<dyn Consumer>,
}

/// A consumer that returned an error or panicked while handling a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerFailure {
    pub consumer: String,
    pub error: String,
}

/// What happened to one published message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of consumers the message was handed to.
    pub delivered: usize,
    /// Whether an overriding consumer claimed the message.
    pub claimed: bool,
    pub failures: Vec<ConsumerFailure>,
}

/// Typed publish/subscribe hub.
///
/// - Delivery is serialized: consumers of a message run one after another on
///   the publishing task, overriding consumers first, each group in
///   registration order.
/// - The subscriber list is snapshotted when dispatch starts, so concurrent
///   `register`/`unregister` calls only affect later messages.
/// - Every consumer call runs in its own Tokio task; an error or panic is
///   logged, re-published as [`Message::Error`] and does not stop delivery to
///   the remaining consumers.
pub struct MessageBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .subscriptions
            .read()
            .map(|s| s.len())
            .unwrap_or_default();
        f.debug_struct("MessageBus")
            .field("subscriptions", &count)
            .finish()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `consumer` for every kind in `kinds`.
    pub fn register(&self, kinds: &[MessageKind], consumer: Arc<dyn Consumer>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(consumer = consumer.name(), ?kinds, "registering bus consumer");

        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.push(Subscription {
            id,
            kinds: kinds.to_vec(),
            consumer,
        });
        id
    }

    /// Remove a registration. Returns false if the id was unknown.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    /// Number of consumers currently registered for `kind`.
    pub fn consumer_count(&self, kind: MessageKind) -> usize {
        self.snapshot(kind).len()
    }

    /// Publish a message to every consumer registered for its kind.
    pub async fn publish(&self, message: Message) -> DispatchReport {
        let kind = message.kind();
        let report = self.dispatch(Arc::new(message)).await;

        // Failures surface on the same channel as everything else. Failures
        // while delivering an Error are only logged to avoid feedback loops.
        if kind != MessageKind::Error {
            for failure in &report.failures {
                let text = format!(
                    "consumer '{}' failed handling {kind}: {}",
                    failure.consumer, failure.error
                );
                self.dispatch(Arc::new(Message::Error(text))).await;
            }
        }

        report
    }

    async fn dispatch(&self, message: Arc<Message>) -> DispatchReport {
        let kind = message.kind();
        let consumers = self.snapshot(kind);
        let mut report = DispatchReport::default();

        if consumers.is_empty() {
            debug!(%kind, "no consumers registered");
            return report;
        }

        let (overriding, regular): (Vec<_>, Vec<_>) =
            consumers.into_iter().partition(|c| c.overriding());

        for consumer in overriding.into_iter().chain(regular) {
            let delivery = Delivery {
                claimed: report.claimed,
            };
            let is_overriding = consumer.overriding();
            let name = consumer.name().to_string();
            report.delivered += 1;

            match deliver(consumer, Arc::clone(&message), delivery).await {
                Ok(Handled::Claimed) if is_overriding => {
                    debug!(consumer = %name, %kind, "message claimed by overriding consumer");
                    report.claimed = true;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(consumer = %name, %kind, %error, "bus consumer failed");
                    report.failures.push(ConsumerFailure {
                        consumer: name,
                        error,
                    });
                }
            }
        }

        report
    }

    fn snapshot(&self, kind: MessageKind) -> Vec<Arc<dyn Consumer>> {
        let subs = self
            .subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.iter()
            .filter(|s| s.kinds.contains(&kind))
            .map(|s| Arc::clone(&s.consumer))
            .collect()
    }
}

/// Run one consumer in its own task so a panic stays contained.
async fn deliver(
    consumer: Arc<dyn Consumer>,
    message: Arc<Message>,
    delivery: Delivery,
) -> std::result::Result<Handled, String> {
    let handle = tokio::spawn(async move { consumer.consume(&message, delivery).await });

    match handle.await {
        Ok(Ok(handled)) => Ok(handled),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let text = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(format!("panicked: {text}"))
        }
        Err(join_err) => Err(join_err.to_string()),
    }
}
