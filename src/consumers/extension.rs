// src/consumers/extension.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bus::{ConsumeFuture, Consumer, Delivery, Handled, Message};
use crate::config::ExtensionConfig;
use crate::engine::RunRequest;
use crate::model::{dedup_files, ChangedFile};

/// Future returned by [`RunRequestSink::abort`].
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Where change consumers send the work they decide should run.
pub trait RunRequestSink: Send + Sync + 'static {
    fn submit(&self, request: RunRequest);

    /// Cancel the running cycle and resolve once the sink is idle.
    fn abort(&self) -> SinkFuture<'_>;

    fn is_running(&self) -> bool;
}

/// Claims file changes for an external provider and forwards only the files
/// with one of its extensions.
///
/// The consumer does nothing unless its provider is the one selected in the
/// config; when active it claims every `FileChange`, even if no file matched.
pub struct ExtensionConsumer {
    name: String,
    extensions: Vec<String>,
    active: bool,
    sink: Arc<dyn RunRequestSink>,
}

impl std::fmt::Debug for ExtensionConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionConsumer")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ExtensionConsumer {
    pub fn new(
        config: &ExtensionConfig,
        active_provider: Option<&str>,
        sink: Arc<dyn RunRequestSink>,
    ) -> Self {
        Self {
            name: format!("extension:{}", config.provider),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            active: active_provider.is_some_and(|p| p.eq_ignore_ascii_case(&config.provider)),
            sink,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn relevant(&self, files: &[ChangedFile]) -> Vec<ChangedFile> {
        dedup_files(
            files
                .iter()
                .filter(|f| self.extensions.iter().any(|ext| f.has_extension(ext)))
                .cloned(),
        )
    }
}

impl Consumer for ExtensionConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn overriding(&self) -> bool {
        true
    }

    fn consume<'a>(&'a self, message: &'a Message, _delivery: Delivery) -> ConsumeFuture<'a> {
        Box::pin(async move {
            if !self.active {
                return Ok(Handled::Passed);
            }
            match message {
                Message::FileChange(change) => {
                    let files = self.relevant(change.files());
                    if files.is_empty() {
                        debug!(consumer = %self.name, "no files with watched extensions");
                    } else {
                        info!(consumer = %self.name, files = files.len(), "forwarding changed files");
                        self.sink.submit(RunRequest::from_files(files));
                    }
                    Ok(Handled::Claimed)
                }
                Message::Abort(abort) => {
                    debug!(consumer = %self.name, reason = %abort.reason, "forwarding abort");
                    self.sink.abort().await;
                    Ok(Handled::Passed)
                }
                _ => Ok(Handled::Passed),
            }
        })
    }
}
