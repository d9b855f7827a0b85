// src/engine/cycle.rs

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build::{BuildPlanner, BuildRunner, OptimisticStrategy, VersionedChange};
use crate::bus::{
    InformationType, Message, MessageBus, RunFinishedMessage, RunInformation, RunStartedMessage,
};
use crate::cache::{CycleResults, RunResultCache};
use crate::errors::WatchtestError;
use crate::model::{RunReport, TestRunInfo};
use crate::projects::ProjectGraph;
use crate::runners::TestOrchestrator;
use crate::watch::FileCache;

use super::queue::RunRequest;

/// Everything one run cycle needs: build, test, cache, report.
pub struct CyclePipeline {
    bus: Arc<MessageBus>,
    cache: Arc<RunResultCache>,
    graph: Arc<ProjectGraph>,
    builder: BuildRunner,
    planner: RwLock<BuildPlanner>,
    orchestrator: TestOrchestrator,
    file_cache: Mutex<FileCache>,
}

impl std::fmt::Debug for CyclePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclePipeline")
            .field("builder", &self.builder)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl CyclePipeline {
    pub fn new(
        bus: Arc<MessageBus>,
        cache: Arc<RunResultCache>,
        graph: Arc<ProjectGraph>,
        builder: BuildRunner,
        planner: BuildPlanner,
        orchestrator: TestOrchestrator,
        file_cache: FileCache,
    ) -> Self {
        Self {
            bus,
            cache,
            graph,
            builder,
            planner: RwLock::new(planner),
            orchestrator,
            file_cache: Mutex::new(file_cache),
        }
    }

    pub fn set_optimistic_strategy(&self, strategy: Option<OptimisticStrategy>) {
        self.planner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set_strategy(strategy);
    }

    fn planner(&self) -> BuildPlanner {
        self.planner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Pair each changed file with its previous content hash, updating the
    /// file cache to the current contents.
    fn versioned(&self, request: &RunRequest) -> Vec<VersionedChange> {
        let mut cache = self
            .file_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        request
            .files
            .iter()
            .map(|file| {
                let swap = cache.swap(file.path());
                VersionedChange {
                    file: file.clone(),
                    previous: swap.previous,
                    removed: swap.removed,
                }
            })
            .collect()
    }

    /// Seed the file cache so the first edit to a file has a previous version.
    pub fn prime_file_cache(&self) {
        let mut cache = self
            .file_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for name in self.graph.projects() {
            if let Some(project) = self.graph.project(name) {
                cache.prime([project.file.as_path()]);
            }
        }
    }

    /// Run one cycle. Always publishes `RunStarted` first and `RunFinished`
    /// last; everything in between goes to the bus as it happens.
    pub async fn run(&self, request: RunRequest, token: &CancellationToken) -> RunReport {
        let mut report = RunReport::default();
        self.bus
            .publish(Message::RunStarted(RunStartedMessage {
                files: request.files.clone(),
            }))
            .await;

        self.execute(&request, token, &mut report).await;

        info!(
            aborted = report.aborted,
            summary = %report.summary(),
            "run cycle finished"
        );
        self.bus
            .publish(Message::RunFinished(RunFinishedMessage {
                report: report.clone(),
            }))
            .await;
        report
    }

    async fn execute(&self, request: &RunRequest, token: &CancellationToken, report: &mut RunReport) {
        self.inform(InformationType::PreProcessing, None).await;

        let changes = self.versioned(request);
        let order = match self
            .planner()
            .plan(&self.graph, &changes, &request.projects, request.all)
        {
            Ok(order) => order,
            Err(err) => {
                self.bus.publish(Message::error(err.to_string())).await;
                return;
            }
        };
        debug!(?order, "build plan");

        let mut cycle = CycleResults::default();
        let mut broken: BTreeSet<String> = BTreeSet::new();

        for name in &order {
            if token.is_cancelled() {
                report.aborted = true;
                break;
            }
            let Some(project) = self.graph.project(name) else {
                self.bus
                    .publish(Message::warning(format!("Project {name} is not configured; skipping")))
                    .await;
                continue;
            };

            self.inform(InformationType::Build, Some(name.clone())).await;
            match self.builder.build(project).await {
                Ok(results) => {
                    if !results.succeeded() {
                        broken.insert(name.clone());
                        broken.extend(self.graph.downstream_of(name));
                    }
                    report.add_build(&results);
                    self.bus.publish(Message::BuildRun(results.clone())).await;
                    cycle.builds.push(results);
                }
                Err(WatchtestError::BuildToolMissing(program)) => {
                    warn!(?program, "build tool missing; ending cycle");
                    self.bus
                        .publish(Message::error(format!(
                            "Build tool {} not found",
                            program.display()
                        )))
                        .await;
                    self.finish(cycle, report).await;
                    return;
                }
                Err(err) => {
                    broken.insert(name.clone());
                    broken.extend(self.graph.downstream_of(name));
                    self.bus
                        .publish(Message::error(format!("Build of {name} failed to run: {err}")))
                        .await;
                }
            }
        }

        let infos = self.test_infos(&order, &broken, &request.tests);
        if !report.aborted && !infos.is_empty() {
            self.inform(InformationType::TestRun, None).await;
            match self.orchestrator.run(&infos, token).await {
                Ok(outcome) => {
                    report.aborted |= outcome.aborted;
                    for results in outcome.results {
                        report.add_tests(&results);
                        self.bus.publish(Message::TestRun(results.clone())).await;
                        cycle.tests.push(results);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "test orchestration failed");
                    self.bus
                        .publish(Message::error(format!("Test run failed: {err}")))
                        .await;
                }
            }
        }

        self.finish(cycle, report).await;
    }

    /// Merge results into the cache and publish the delta.
    ///
    /// Test results of an aborted cycle are discarded: they would resolve
    /// failures the cycle never got to re-check.
    async fn finish(&self, mut cycle: CycleResults, report: &RunReport) {
        if report.aborted {
            cycle.tests.clear();
        }
        if cycle.is_empty() {
            return;
        }
        match self.cache.apply_cycle(&cycle) {
            Ok(delta) if delta.is_empty() => debug!("no result changes"),
            Ok(delta) => {
                self.bus.publish(Message::CacheDelta(delta)).await;
            }
            Err(err) => {
                self.bus
                    .publish(Message::error(format!("Result cache update failed: {err}")))
                    .await;
            }
        }
    }

    /// Test assemblies of projects that built, plus explicitly requested
    /// tests for assemblies not already covered.
    fn test_infos(
        &self,
        built: &[String],
        broken: &BTreeSet<String>,
        explicit: &[TestRunInfo],
    ) -> Vec<TestRunInfo> {
        let mut infos: Vec<TestRunInfo> = built
            .iter()
            .filter(|name| !broken.contains(*name))
            .filter_map(|name| self.graph.test_info(name))
            .collect();
        for info in explicit {
            if !infos.iter().any(|i| i.assembly() == info.assembly()) {
                infos.push(info.clone());
            }
        }
        infos
    }

    async fn inform(&self, kind: InformationType, project: Option<String>) {
        self.bus
            .publish(Message::RunInformation(RunInformation { kind, project }))
            .await;
    }
}
