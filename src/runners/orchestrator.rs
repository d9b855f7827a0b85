// src/runners/orchestrator.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempPath;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{LiveTestStatus, Message, MessageBus};
use crate::config::EngineConfig;
use crate::errors::{Result, WatchtestError};
use crate::exec::{ProcessBackend, ProcessError};
use crate::fs::FileSystem;
use crate::model::{TestResultItem, TestRunInfo, TestRunResults};
use crate::runners::command_line::build_invocation;
use crate::runners::locator::{Resolution, RunnerGroupKey, RunnerLocator};
use crate::runners::nunit_xml::{parse_results, ParsedAssembly};
use crate::runners::platform::Platform;
use crate::runners::result_file::read_results;
use crate::types::{RunnerKind, TestOutcome};

/// Entries dispatched to one runner executable together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerGroup {
    pub key: RunnerGroupKey,
    pub entries: Vec<TestRunInfo>,
}

/// What the test phase of a cycle produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRunOutcome {
    /// One entry per assembly that ran.
    pub results: Vec<TestRunResults>,
    /// Abort was observed before all groups ran.
    pub aborted: bool,
}

/// Runs NUnit-style console runners over groups of test assemblies.
///
/// Groups run one after another; the abort token is checked before each
/// group, never while a runner process is alive.
pub struct TestOrchestrator {
    bus: Arc<MessageBus>,
    backend: Arc<dyn ProcessBackend>,
    locator: RunnerLocator,
    platform: Platform,
    max_command_length: Option<usize>,
    kind: RunnerKind,
    categories_to_ignore: Vec<String>,
    env: Vec<(String, String)>,
}

impl std::fmt::Debug for TestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestOrchestrator")
            .field("platform", &self.platform)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl TestOrchestrator {
    pub fn from_config(
        cfg: &EngineConfig,
        bus: Arc<MessageBus>,
        backend: Arc<dyn ProcessBackend>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            bus,
            backend,
            locator: RunnerLocator::new(cfg.runners.nunit.as_ref(), fs),
            platform: Platform::current().with_max_command_length(cfg.engine.max_command_length),
            max_command_length: cfg.engine.max_command_length,
            kind: RunnerKind::NUnit,
            categories_to_ignore: cfg.engine.categories_to_ignore.clone(),
            env: cfg
                .engine
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Replace the host platform conventions (tests pin one platform).
    /// A configured command length limit still applies.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform.with_max_command_length(self.max_command_length);
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Resolve and group entries by (executable, tag), first-appearance order.
    ///
    /// Entries without a usable runner are dropped with a `Warning`; entries
    /// that only run named tests but name none are left out.
    pub async fn group(&self, infos: &[TestRunInfo]) -> Vec<RunnerGroup> {
        let mut groups: Vec<RunnerGroup> = Vec::new();
        let mut reported: HashSet<PathBuf> = HashSet::new();

        for info in infos {
            let key = match self.locator.resolve(info.framework()) {
                Resolution::Found(key) => key,
                Resolution::Missing(exe) => {
                    warn!(?exe, assembly = ?info.assembly(), "test runner executable not found");
                    if reported.insert(exe.clone()) {
                        self.bus
                            .publish(Message::warning(format!(
                                "Test runner {} not found; skipping tests",
                                exe.display()
                            )))
                            .await;
                    }
                    continue;
                }
                Resolution::NotConfigured => {
                    warn!(assembly = ?info.assembly(), "no test runner configured");
                    self.bus
                        .publish(Message::warning(format!(
                            "No test runner configured for {}",
                            info.assembly().display()
                        )))
                        .await;
                    continue;
                }
            };

            if info.skipped_by(self.kind) {
                debug!(assembly = ?info.assembly(), "only named tests requested but none listed");
                continue;
            }

            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.entries.push(info.clone()),
                None => groups.push(RunnerGroup {
                    key,
                    entries: vec![info.clone()],
                }),
            }
        }

        groups
    }

    /// Run every group, checking `abort` before each one.
    ///
    /// Only infrastructure faults (no temp file) are returned as `Err`; a
    /// group whose runner or result file fails reports an `Error` message and
    /// contributes no results.
    pub async fn run(&self, infos: &[TestRunInfo], abort: &CancellationToken) -> Result<TestRunOutcome> {
        let groups = self.group(infos).await;
        let mut outcome = TestRunOutcome::default();
        let mut failed: Vec<TestResultItem> = Vec::new();
        let mut completed = 0usize;

        for (index, group) in groups.iter().enumerate() {
            if abort.is_cancelled() {
                info!(
                    remaining = groups.len() - index,
                    "abort requested; skipping remaining runner groups"
                );
                outcome.aborted = true;
                break;
            }

            self.bus
                .publish(Message::LiveTestStatus(LiveTestStatus {
                    current_assembly: group
                        .entries
                        .first()
                        .map(|e| e.assembly().to_path_buf())
                        .unwrap_or_default(),
                    current_group: index + 1,
                    total_groups: groups.len(),
                    tests_completed: completed,
                    failed_tests: failed.clone(),
                }))
                .await;

            let results = self.run_group(group).await?;
            for result in &results {
                completed += result.items.len();
                failed.extend(
                    result
                        .items
                        .iter()
                        .filter(|i| i.outcome == TestOutcome::Failed)
                        .cloned(),
                );
            }
            outcome.results.extend(results);
        }

        Ok(outcome)
    }

    async fn run_group(&self, group: &RunnerGroup) -> Result<Vec<TestRunResults>> {
        let result_file = create_result_file()?;
        let started = Instant::now();

        let entries: Vec<&TestRunInfo> = group.entries.iter().collect();
        let invocation = build_invocation(
            &self.platform,
            &group.key,
            &entries,
            self.kind,
            &self.categories_to_ignore,
            &result_file,
        );
        let spec = invocation.spec.envs(self.env.iter().cloned());
        info!(
            runner = ?group.key.executable,
            tag = %group.key.tag,
            assemblies = entries.len(),
            run_list = invocation.includes_run_list,
            "running test group"
        );

        match self.backend.run(&spec).await {
            Ok(output) if !output.success() => {
                debug!(exit_code = output.exit_code, "test runner exited non-zero; parsing anyway");
            }
            Ok(_) => {}
            Err(ProcessError::NotFound(exe)) => {
                self.bus
                    .publish(Message::warning(format!(
                        "Test runner {} disappeared; skipping group",
                        exe.display()
                    )))
                    .await;
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(error = %err, "test runner failed to run");
                self.bus
                    .publish(Message::error(format!("Test run failed: {err}")))
                    .await;
                return Ok(Vec::new());
            }
        }

        let text = match read_results(&result_file).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "could not read test results");
                self.bus
                    .publish(Message::error(format!("Could not read test results: {err:#}")))
                    .await;
                return Ok(Vec::new());
            }
        };

        let fallback = entries
            .first()
            .map(|e| e.assembly().display().to_string())
            .unwrap_or_default();
        let parsed = parse_results(&text, self.kind, &fallback);
        let elapsed = started.elapsed();

        let results = entries
            .iter()
            .map(|entry| {
                let mut results =
                    TestRunResults::new(entry.assembly(), self.kind, items_for(entry.assembly(), &parsed));
                if invocation.includes_run_list {
                    results.ran_tests = Some(entry.tests_for(self.kind));
                }
                results.elapsed = elapsed;
                results
            })
            .collect();

        // `result_file` is removed when dropped here.
        Ok(results)
    }
}

fn create_result_file() -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("watchtest-")
        .suffix(".xml")
        .tempfile()
        .map_err(WatchtestError::IoError)?;
    Ok(file.into_temp_path())
}

/// Items of the parsed suite matching `assembly`, re-keyed to its path.
///
/// Suites are matched by full path first, then by file name.
fn items_for(assembly: &Path, parsed: &[ParsedAssembly]) -> Vec<TestResultItem> {
    let file_name = assembly.file_name();
    let matching = parsed
        .iter()
        .find(|p| Path::new(&p.name) == assembly)
        .or_else(|| {
            parsed
                .iter()
                .find(|p| file_name.is_some() && Path::new(&p.name).file_name() == file_name)
        });

    matching
        .map(|p| {
            p.items
                .iter()
                .cloned()
                .map(|mut item| {
                    item.assembly = assembly.to_path_buf();
                    item
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunnerKind;

    #[test]
    fn items_match_by_file_name_when_paths_differ() {
        let parsed = vec![ParsedAssembly {
            name: "/build/out/a.dll".to_string(),
            items: vec![TestResultItem::new(
                "/build/out/a.dll",
                RunnerKind::NUnit,
                "T1",
                TestOutcome::Failed,
            )],
        }];

        let items = items_for(Path::new("/bin/a.dll"), &parsed);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].assembly, Path::new("/bin/a.dll"));
        assert!(items_for(Path::new("/bin/b.dll"), &parsed).is_empty());
    }

    #[test]
    fn pinned_platform_keeps_configured_command_length() {
        let mut cfg = crate::config::default_config(Path::new("/repo"));
        cfg.engine.max_command_length = Some(64);
        let orchestrator = TestOrchestrator::from_config(
            &cfg,
            Arc::new(MessageBus::new()),
            Arc::new(crate::exec::TokioProcessBackend::new()),
            Arc::new(crate::fs::mock::MockFileSystem::new()),
        )
        .with_platform(Platform::WINDOWS);

        assert_eq!(orchestrator.platform().max_command_length, 64);
        assert_eq!(orchestrator.platform().flag("run=A"), "/run=A");
    }
}
