// src/runners/locator.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::fs::FileSystem;

/// Key of a runner group: one executable under one framework tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunnerGroupKey {
    pub executable: PathBuf,
    /// Empty when the default runner serves the framework.
    pub tag: String,
}

/// Outcome of resolving a framework tag to a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(RunnerGroupKey),
    /// Configured, but the executable does not exist.
    Missing(PathBuf),
    NotConfigured,
}

/// Maps framework tags to runner executables.
#[derive(Debug, Clone)]
pub struct RunnerLocator {
    default: Option<PathBuf>,
    frameworks: BTreeMap<String, PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl RunnerLocator {
    pub fn new(config: Option<&RunnerConfig>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            default: config.and_then(|c| c.default.clone()),
            frameworks: config.map(|c| c.frameworks.clone()).unwrap_or_default(),
            fs,
        }
    }

    /// Framework-specific runner if one is configured for `framework`, else
    /// the default runner with an empty tag.
    pub fn resolve(&self, framework: &str) -> Resolution {
        let specific = (!framework.is_empty())
            .then(|| self.frameworks.get(framework))
            .flatten();

        let key = match (specific, &self.default) {
            (Some(exe), _) => RunnerGroupKey {
                executable: exe.clone(),
                tag: framework.to_string(),
            },
            (None, Some(exe)) => RunnerGroupKey {
                executable: exe.clone(),
                tag: String::new(),
            },
            (None, None) => return Resolution::NotConfigured,
        };

        if self.fs.is_file(&key.executable) {
            Resolution::Found(key)
        } else {
            Resolution::Missing(key.executable)
        }
    }
}
