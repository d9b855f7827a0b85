// src/engine/context.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::build::{edits_only_strategy, BuildPlanner, BuildRunner};
use crate::bus::{AbortMessage, Message, MessageBus, MessageKind, ProjectChangeMessage, SubscriptionId};
use crate::cache::RunResultCache;
use crate::config::EngineConfig;
use crate::consumers::{
    ExtensionConsumer, FeedbackSink, ProjectChangeConsumer, RunRequestSink, SinkConsumer,
};
use crate::errors::Result;
use crate::exec::ProcessBackend;
use crate::fs::FileSystem;
use crate::model::TestRunInfo;
use crate::projects::ProjectGraph;
use crate::runners::TestOrchestrator;
use crate::watch::{DirectoryWatcher, FileCache, WatchOptions, WatcherState};

use super::coordinator::RunCoordinator;
use super::cycle::CyclePipeline;
use super::queue::{RunQueue, RunRequest};

/// Shared services every engine component is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub root: PathBuf,
    pub config: Arc<EngineConfig>,
    pub bus: Arc<MessageBus>,
    pub cache: Arc<RunResultCache>,
    pub graph: Arc<ProjectGraph>,
    pub fs: Arc<dyn FileSystem>,
    pub backend: Arc<dyn ProcessBackend>,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("root", &self.root)
            .field("projects", &self.graph.projects().count())
            .finish_non_exhaustive()
    }
}

impl EngineContext {
    pub fn new(
        config: EngineConfig,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ProcessBackend>,
    ) -> Result<Self> {
        let root = root.into();
        let graph = ProjectGraph::from_config(&config, &root)?;
        let cache = RunResultCache::new();
        if config.engine.deltas {
            cache.enable_deltas();
        } else {
            cache.disable_deltas();
        }
        Ok(Self {
            root,
            config: Arc::new(config),
            bus: Arc::new(MessageBus::new()),
            cache: Arc::new(cache),
            graph: Arc::new(graph),
            fs,
            backend,
        })
    }
}

/// A running engine: watcher, consumers and the run coordinator wired to one
/// bus.
pub struct Engine {
    ctx: EngineContext,
    coordinator: Arc<RunCoordinator>,
    watcher: DirectoryWatcher,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("watcher", &self.watcher.state())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build every component and register the consumers. Must be called
    /// inside a Tokio runtime; nothing is watched until [`Engine::watch`].
    pub fn start(ctx: EngineContext) -> Result<Self> {
        let cfg = ctx.config.as_ref();
        let planner = BuildPlanner::new(cfg.engine.optimistic_build.then(edits_only_strategy));
        let pipeline = CyclePipeline::new(
            Arc::clone(&ctx.bus),
            Arc::clone(&ctx.cache),
            Arc::clone(&ctx.graph),
            BuildRunner::from_config(cfg, Arc::clone(&ctx.backend)),
            planner,
            TestOrchestrator::from_config(
                cfg,
                Arc::clone(&ctx.bus),
                Arc::clone(&ctx.backend),
                Arc::clone(&ctx.fs),
            ),
            FileCache::new(Arc::clone(&ctx.fs)),
        );
        pipeline.prime_file_cache();

        let queue = RunQueue::new(
            cfg.engine.triggered_while_running_behaviour,
            cfg.engine.queue_length,
        );
        let coordinator = RunCoordinator::start(pipeline, queue);
        let sink: Arc<dyn RunRequestSink> = coordinator.clone();

        let mut subscriptions = vec![ctx.bus.register(&[MessageKind::Abort], coordinator.clone())];
        for ext in &cfg.extensions {
            let consumer = ExtensionConsumer::new(ext, cfg.engine.provider.as_deref(), Arc::clone(&sink));
            debug!(provider = %ext.provider, active = consumer.is_active(), "registering extension consumer");
            subscriptions.push(ctx.bus.register(
                &[MessageKind::FileChange, MessageKind::Abort],
                Arc::new(consumer),
            ));
        }
        subscriptions.push(ctx.bus.register(
            &[MessageKind::FileChange, MessageKind::ProjectChange],
            Arc::new(ProjectChangeConsumer::new(Arc::clone(&ctx.graph), sink)),
        ));

        let watcher = DirectoryWatcher::new(Arc::clone(&ctx.bus), WatchOptions::from_config(cfg));

        info!(
            root = %ctx.root.display(),
            projects = ctx.graph.projects().count(),
            "engine started"
        );
        Ok(Self {
            ctx,
            coordinator,
            watcher,
            subscriptions: Mutex::new(subscriptions),
        })
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.ctx.bus
    }

    pub fn cache(&self) -> &Arc<RunResultCache> {
        &self.ctx.cache
    }

    pub fn coordinator(&self) -> &Arc<RunCoordinator> {
        &self.coordinator
    }

    /// Register a front-end for every message kind.
    pub fn add_sink(&self, name: &str, sink: Arc<dyn FeedbackSink>) -> SubscriptionId {
        let id = self
            .ctx
            .bus
            .register(&MessageKind::ALL, Arc::new(SinkConsumer::new(name, sink)));
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(id);
        id
    }

    pub fn watch(&self, token: &Path) -> Result<()> {
        self.watcher.watch(token)
    }

    pub fn pause(&self) {
        self.watcher.pause();
    }

    pub fn resume(&self) {
        self.watcher.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.watcher.is_paused()
    }

    pub fn watcher_state(&self) -> WatcherState {
        self.watcher.state()
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// "build-test-all".
    pub async fn build_test_all(&self) {
        self.ctx
            .bus
            .publish(Message::ProjectChange(ProjectChangeMessage::all()))
            .await;
    }

    /// "build-test-projects".
    pub async fn build_test_projects<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ctx
            .bus
            .publish(Message::ProjectChange(ProjectChangeMessage::projects(names)))
            .await;
    }

    /// Run the given tests without building anything.
    pub fn run_tests(&self, tests: Vec<TestRunInfo>) {
        self.coordinator.submit(RunRequest::for_tests(tests));
    }

    /// Publish `Abort` and return once the engine is idle.
    pub async fn abort(&self, reason: &str) {
        self.ctx
            .bus
            .publish(Message::Abort(AbortMessage::new(reason)))
            .await;
    }

    pub async fn wait_idle(&self) {
        self.coordinator.wait_idle().await;
    }

    pub fn set_optimistic_build(&self, enabled: bool) {
        self.coordinator
            .set_optimistic_strategy(enabled.then(edits_only_strategy));
    }

    /// Forget every cached result ("clear list") and publish what went away.
    pub async fn clear_results(&self) -> Result<()> {
        let delta = self.ctx.cache.clear()?;
        if !delta.is_empty() {
            self.ctx.bus.publish(Message::CacheDelta(delta)).await;
        }
        Ok(())
    }

    /// Stop watching, finish the worker and drop every registration.
    pub async fn shutdown(self) {
        self.watcher.stop();
        self.coordinator.shutdown().await;
        let ids = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for id in ids {
            self.ctx.bus.unregister(id);
        }
        info!("engine stopped");
    }
}
