// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::model::{EngineConfig, RawConfigFile};
use crate::errors::Result;

/// Default config file name, looked up in the watch root.
pub const DEFAULT_CONFIG_FILE: &str = "Watchtest.toml";

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file {:?}", path))?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(?path, projects = config.project.len(), "parsed config file");

    Ok(config)
}

/// Load, validate, and resolve every relative path against `root`.
pub fn load_and_validate(path: impl AsRef<Path>, root: &Path) -> Result<EngineConfig> {
    let raw = load_from_path(&path)?;
    let config = EngineConfig::try_from(raw)?;
    Ok(resolve_paths(config, root))
}

/// Config used when no file exists: no projects, default runner lookup.
pub fn default_config(root: &Path) -> EngineConfig {
    resolve_paths(EngineConfig::default(), root)
}

/// Pick the config path: explicit `--config`, else `Watchtest.toml` in `root`.
pub fn config_path(explicit: Option<&str>, root: &Path) -> PathBuf {
    match explicit {
        Some(p) => PathBuf::from(p),
        None => root.join(DEFAULT_CONFIG_FILE),
    }
}

fn resolve_paths(mut config: EngineConfig, root: &Path) -> EngineConfig {
    let resolve = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    };

    if let Some(out) = config.engine.custom_output.as_deref() {
        config.engine.custom_output = Some(resolve(out));
    }

    if let Some(nunit) = config.runners.nunit.as_mut() {
        nunit.default = nunit.default.as_deref().map(resolve);
        for exe in nunit.frameworks.values_mut() {
            *exe = resolve(exe);
        }
    }

    for project in &mut config.projects {
        project.file = resolve(&project.file);
        project.assembly = project.assembly.as_deref().map(resolve);
    }

    config
}
