// src/config/validate.rs

use std::collections::HashSet;

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{EngineConfig, RawConfigFile};
use crate::errors::{Result, WatchtestError};

impl TryFrom<RawConfigFile> for EngineConfig {
    type Error = WatchtestError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(EngineConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine_section(cfg)?;
    validate_projects(cfg)?;
    validate_project_graph(cfg)?;
    validate_extensions(cfg)?;
    Ok(())
}

fn validate_engine_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.queue_length == 0 {
        return Err(WatchtestError::ConfigError(
            "[engine].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.engine.max_command_length == Some(0) {
        return Err(WatchtestError::ConfigError(
            "[engine].max_command_length must be > 0".to_string(),
        ));
    }

    for pattern in &cfg.engine.ignore {
        Glob::new(pattern).map_err(|e| {
            WatchtestError::ConfigError(format!("invalid ignore pattern '{pattern}': {e}"))
        })?;
    }

    Ok(())
}

fn validate_projects(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for project in &cfg.project {
        if project.name.trim().is_empty() {
            return Err(WatchtestError::ConfigError(
                "[[project]] entries must have a non-empty name".to_string(),
            ));
        }
        if !seen.insert(project.name.as_str()) {
            return Err(WatchtestError::ConfigError(format!(
                "project '{}' is defined more than once",
                project.name
            )));
        }
        for pattern in &project.watch {
            Glob::new(pattern).map_err(|e| {
                WatchtestError::ConfigError(format!(
                    "project '{}' has invalid watch pattern '{pattern}': {e}",
                    project.name
                ))
            })?;
        }
    }

    for project in &cfg.project {
        for reference in &project.references {
            if reference == &project.name {
                return Err(WatchtestError::ConfigError(format!(
                    "project '{}' cannot reference itself",
                    project.name
                )));
            }
            if !seen.contains(reference.as_str()) {
                return Err(WatchtestError::ProjectNotFound(format!(
                    "'{}' (referenced by '{}')",
                    reference, project.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_project_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: reference -> project.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for project in &cfg.project {
        graph.add_node(project.name.as_str());
    }
    for project in &cfg.project {
        for reference in &project.references {
            graph.add_edge(reference.as_str(), project.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(WatchtestError::DependencyCycle(format!(
            "project references form a cycle involving '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_extensions(cfg: &RawConfigFile) -> Result<()> {
    for ext in &cfg.extension {
        if ext.extensions.is_empty() {
            return Err(WatchtestError::ConfigError(format!(
                "[[extension]] for provider '{}' lists no extensions",
                ext.provider
            )));
        }
    }
    Ok(())
}
