// src/build/runner.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::build::parser::parse_diagnostics;
use crate::config::{EngineConfig, ProjectConfig};
use crate::errors::{Result, WatchtestError};
use crate::exec::{ProcessBackend, ProcessError, ProcessSpec};
use crate::model::{BuildResultItem, BuildRunResults};

/// Builds single projects through the configured build program.
///
/// A compiler failure is a result, not an error: only a missing build tool or
/// a failure to start it is returned as `Err`.
pub struct BuildRunner {
    backend: Arc<dyn ProcessBackend>,
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl std::fmt::Debug for BuildRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildRunner")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl BuildRunner {
    pub fn new(backend: Arc<dyn ProcessBackend>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            backend,
            program: program.into(),
            args,
            env: Vec::new(),
        }
    }

    pub fn from_config(cfg: &EngineConfig, backend: Arc<dyn ProcessBackend>) -> Self {
        let mut runner = Self::new(backend, cfg.build.program.clone(), cfg.build.args.clone());
        runner.env = cfg
            .engine
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        runner
    }

    /// Invocation for one project; `{project}` is replaced by the project file.
    pub fn command_for(&self, project: &ProjectConfig) -> ProcessSpec {
        let file = project.file.display().to_string();
        let args: Vec<String> = if self.args.is_empty() {
            vec![file]
        } else {
            self.args.iter().map(|a| a.replace("{project}", &file)).collect()
        };

        let mut spec = ProcessSpec::new(&self.program)
            .args(args)
            .envs(self.env.iter().cloned());
        if let Some(dir) = project_dir(project) {
            spec = spec.current_dir(dir);
        }
        spec
    }

    pub async fn build(&self, project: &ProjectConfig) -> Result<BuildRunResults> {
        let spec = self.command_for(project);
        let started = Instant::now();
        info!(project = %project.name, command = %spec.display(), "building project");

        let output = match self.backend.run(&spec).await {
            Ok(output) => output,
            Err(ProcessError::NotFound(program)) => {
                return Err(WatchtestError::BuildToolMissing(program));
            }
            Err(err) => return Err(WatchtestError::Other(err.into())),
        };

        let base_dir = project_dir(project).unwrap_or_else(|| PathBuf::from("."));
        let mut items = parse_diagnostics(&project.name, &base_dir, output.lines());

        if !output.success() && !items.iter().any(BuildResultItem::is_error) {
            warn!(
                project = %project.name,
                exit_code = output.exit_code,
                "build failed without parseable diagnostics"
            );
            items.push(BuildResultItem::error(
                project.name.clone(),
                project.file.clone(),
                format!("build exited with code {}", output.exit_code),
            ));
        }

        let results = BuildRunResults::new(project.name.clone(), items, started.elapsed());
        info!(
            project = %project.name,
            succeeded = results.succeeded(),
            errors = results.errors().count(),
            warnings = results.warnings().count(),
            "build finished"
        );
        Ok(results)
    }
}

fn project_dir(project: &ProjectConfig) -> Option<PathBuf> {
    project
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
