// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::TriggerWhileRunningBehaviour;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// debounce_ms = 200
/// ignore = ["**/obj/**", "**/.git/**"]
/// categories_to_ignore = ["Slow"]
///
/// [engine.env]
/// NUNIT_INTERNAL_TRACE = "1"
///
/// [build]
/// program = "msbuild"
/// args = ["{project}", "/nologo"]
///
/// [runners.nunit]
/// default = "tools/nunit/nunit-console.exe"
/// frameworks = { "v4.0" = "tools/nunit-net40/nunit-console.exe" }
///
/// [[project]]
/// name = "Core"
/// file = "src/Core/Core.csproj"
/// watch = ["src/Core/**/*.cs"]
/// assembly = "src/Core/bin/Debug/Core.Tests.dll"
/// references = ["Shared"]
/// ```
///
/// Raw form: exactly what serde produced. Use [`EngineConfig`] (via
/// `TryFrom`) for anything semantic.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub runners: RunnersSection,

    #[serde(default)]
    pub project: Vec<ProjectConfig>,

    #[serde(default)]
    pub extension: Vec<ExtensionConfig>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Quiet period after the last filesystem event before a batch is emitted.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Build output directory; changes below it never trigger runs.
    #[serde(default)]
    pub custom_output: Option<PathBuf>,

    /// Glob patterns (relative to the watch root) that are never reported.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Publish (added, removed) pairs instead of the full result set.
    #[serde(default = "default_true")]
    pub deltas: bool,

    /// Rebuild only the changed project when every changed file is a plain
    /// source edit, instead of the project and all its dependents.
    #[serde(default)]
    pub optimistic_build: bool,

    /// Test categories passed to the runner as excluded.
    #[serde(default)]
    pub categories_to_ignore: Vec<String>,

    /// Environment overlay for every spawned build/test process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Maximum number of run batches remembered while a cycle is running.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Active language provider; extension consumers only react when their
    /// provider name matches.
    #[serde(default)]
    pub provider: Option<String>,

    /// Override for the platform's maximum command-line length.
    #[serde(default)]
    pub max_command_length: Option<usize>,
}

pub(crate) fn default_debounce_ms() -> u64 {
    200
}

fn default_ignore() -> Vec<String> {
    vec!["**/.git/**".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_queue_length() -> usize {
    1
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            custom_output: None,
            ignore: default_ignore(),
            deltas: true,
            optimistic_build: false,
            categories_to_ignore: Vec::new(),
            env: BTreeMap::new(),
            queue_length: default_queue_length(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            provider: None,
            max_command_length: None,
        }
    }
}

/// `[build]` section.
///
/// `{project}` in `args` is replaced by the project file path. When `args` is
/// empty the project file is passed as the only argument.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    #[serde(default = "default_build_program")]
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}

fn default_build_program() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("msbuild.exe")
    } else {
        PathBuf::from("dotnet")
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            args: Vec::new(),
        }
    }
}

/// `[runners]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunnersSection {
    #[serde(default)]
    pub nunit: Option<RunnerConfig>,
}

/// `[runners.<kind>]`: default executable plus per-framework overrides.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunnerConfig {
    #[serde(default)]
    pub default: Option<PathBuf>,

    #[serde(default)]
    pub frameworks: BTreeMap<String, PathBuf>,
}

/// `[[project]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    /// Project file handed to the build program.
    pub file: PathBuf,

    /// Globs (relative to the watch root) of files owned by this project.
    /// Defaults to everything below the project file's directory.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Test assembly produced by this project, if any.
    #[serde(default)]
    pub assembly: Option<PathBuf>,

    /// Target framework tag used to pick a runner (`""` = default runner).
    #[serde(default)]
    pub framework: String,

    /// Names of projects this project depends on.
    #[serde(default)]
    pub references: Vec<String>,
}

/// `[[extension]]` entry: an overriding change consumer for one language
/// provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    pub provider: String,
    pub extensions: Vec<String>,
}

/// Validated configuration consumed by the engine.
///
/// Paths are resolved against the watch root by the loader; the engine never
/// sees relative paths.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub build: BuildSection,
    pub runners: RunnersSection,
    pub projects: Vec<ProjectConfig>,
    pub extensions: Vec<ExtensionConfig>,
}

impl EngineConfig {
    /// Construct without validation. Only `TryFrom<RawConfigFile>` and tests
    /// should need this.
    pub fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            engine: raw.engine,
            build: raw.build,
            runners: raw.runners,
            projects: raw.project,
            extensions: raw.extension,
        }
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}
