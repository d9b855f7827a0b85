// src/consumers/project.rs

use std::sync::Arc;

use tracing::debug;

use crate::bus::{ConsumeFuture, Consumer, Delivery, Handled, Message};
use crate::consumers::extension::RunRequestSink;
use crate::engine::RunRequest;
use crate::projects::ProjectGraph;

/// Default handler for file and project changes.
///
/// File changes already claimed by an overriding consumer are left alone, as
/// are files no project owns. `ProjectChange` requests are always handled.
pub struct ProjectChangeConsumer {
    graph: Arc<ProjectGraph>,
    sink: Arc<dyn RunRequestSink>,
}

impl ProjectChangeConsumer {
    pub fn new(graph: Arc<ProjectGraph>, sink: Arc<dyn RunRequestSink>) -> Self {
        Self { graph, sink }
    }
}

impl Consumer for ProjectChangeConsumer {
    fn name(&self) -> &str {
        "project-change"
    }

    fn consume<'a>(&'a self, message: &'a Message, delivery: Delivery) -> ConsumeFuture<'a> {
        Box::pin(async move {
            match message {
                Message::FileChange(change) => {
                    if delivery.claimed {
                        debug!("file change claimed by another consumer");
                        return Ok(Handled::Passed);
                    }
                    let owned: Vec<_> = change
                        .files()
                        .iter()
                        .filter(|f| !self.graph.projects_for_file(f.path()).is_empty())
                        .cloned()
                        .collect();
                    if owned.is_empty() {
                        debug!(files = change.files().len(), "no project owns the changed files");
                        return Ok(Handled::Passed);
                    }
                    self.sink.submit(RunRequest::from_files(owned));
                    Ok(Handled::Claimed)
                }
                Message::ProjectChange(change) => {
                    let request = if change.projects.is_empty() {
                        RunRequest::all_projects()
                    } else {
                        RunRequest::for_projects(change.projects.iter().cloned())
                    };
                    self.sink.submit(request);
                    Ok(Handled::Claimed)
                }
                _ => Ok(Handled::Passed),
            }
        })
    }
}
