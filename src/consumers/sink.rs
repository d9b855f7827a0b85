// src/consumers/sink.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{ConsumeFuture, Consumer, Delivery, Handled, InformationType, Message};

/// Front-end hook: receives every message the engine publishes.
pub trait FeedbackSink: Send + Sync + 'static {
    fn forward(&self, message: &Message);
}

/// Bus consumer that hands every message to a [`FeedbackSink`].
pub struct SinkConsumer {
    name: String,
    sink: Arc<dyn FeedbackSink>,
}

impl SinkConsumer {
    pub fn new(name: impl Into<String>, sink: Arc<dyn FeedbackSink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }
}

impl Consumer for SinkConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn consume<'a>(&'a self, message: &'a Message, _delivery: Delivery) -> ConsumeFuture<'a> {
        self.sink.forward(message);
        Box::pin(async { Ok(Handled::Passed) })
    }
}

/// Writes feedback to the log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FeedbackSink for LogSink {
    fn forward(&self, message: &Message) {
        match message {
            Message::RunStarted(started) => info!(files = started.files.len(), "run started"),
            Message::RunFinished(finished) => {
                if finished.report.succeeded() {
                    info!(summary = %finished.report.summary(), "run finished");
                } else {
                    warn!(summary = %finished.report.summary(), "run finished");
                }
            }
            Message::RunInformation(step) => match step.kind {
                InformationType::Build => {
                    info!(project = step.project.as_deref().unwrap_or(""), "building")
                }
                InformationType::TestRun => info!("running tests"),
                InformationType::PreProcessing => debug!("preparing run"),
            },
            Message::LiveTestStatus(status) => info!(
                group = status.current_group,
                groups = status.total_groups,
                assembly = %status.current_assembly.display(),
                failed = status.failed_tests.len(),
                "testing"
            ),
            Message::CacheDelta(delta) => {
                for item in &delta.errors.added {
                    error!(
                        file = %item.file.display(),
                        line = item.line,
                        column = item.column,
                        "{}",
                        item.message
                    );
                }
                for item in &delta.warnings.added {
                    warn!(
                        file = %item.file.display(),
                        line = item.line,
                        column = item.column,
                        "{}",
                        item.message
                    );
                }
                for item in &delta.failed.added {
                    error!(test = %item.display_name, "failed: {}", item.message);
                }
                for item in &delta.failed.removed {
                    info!(test = %item.display_name, "fixed");
                }
                for item in &delta.ignored.added {
                    info!(test = %item.display_name, "ignored");
                }
                info!(
                    errors = delta.errors.added.len(),
                    fixed_errors = delta.errors.removed.len(),
                    failed = delta.failed.added.len(),
                    fixed_tests = delta.failed.removed.len(),
                    full_refresh = delta.full_refresh,
                    "results changed"
                );
            }
            Message::Error(text) => error!("{text}"),
            Message::Warning(text) => warn!("{text}"),
            Message::Information(text) => info!("{text}"),
            Message::Abort(abort) => info!(reason = %abort.reason, "abort requested"),
            Message::FileChange(change) => debug!(files = change.files().len(), "files changed"),
            Message::ProjectChange(change) => debug!(projects = ?change.projects, "projects requested"),
            Message::BuildRun(results) => debug!(
                project = %results.project,
                succeeded = results.succeeded(),
                elapsed_ms = results.elapsed.as_millis() as u64,
                "build done"
            ),
            Message::TestRun(results) => debug!(
                assembly = %results.assembly().display(),
                tests = results.items.len(),
                elapsed_ms = results.elapsed.as_millis() as u64,
                "tests done"
            ),
        }
    }
}

/// Streams every message into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Arc<Message>>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Arc<Message>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FeedbackSink for ChannelSink {
    fn forward(&self, message: &Message) {
        if self.tx.send(Arc::new(message.clone())).is_err() {
            debug!("feedback receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_streams_messages() {
        let (sink, mut rx) = ChannelSink::channel();
        let consumer = SinkConsumer::new("channel", Arc::new(sink));

        let handled = consumer
            .consume(&Message::warning("careful"), Delivery::default())
            .await
            .unwrap();

        assert_eq!(handled, Handled::Passed);
        let got = rx.recv().await.unwrap();
        assert_eq!(*got, Message::warning("careful"));
    }
}
