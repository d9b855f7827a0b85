// src/lib.rs

pub mod build;
pub mod bus;
pub mod cache;
pub mod cli;
pub mod config;
pub mod consumers;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod projects;
pub mod runners;
pub mod types;
pub mod watch;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{config_path, default_config, load_and_validate, EngineConfig};
use crate::consumers::LogSink;
use crate::engine::{Engine, EngineContext};
use crate::exec::TokioProcessBackend;
use crate::fs::RealFileSystem;
use crate::projects::ProjectGraph;
use crate::watch::path_utils::watch_dir_for;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (or the default config when no file exists)
/// - the engine: bus, consumers, coordinator, orchestrator
/// - the directory watcher (skipped with `--once`)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let token = match &args.watch_token {
        Some(t) => PathBuf::from(t),
        None => std::env::current_dir().context("reading current directory")?,
    };
    let root = watch_dir_for(&token);
    let cfg = load_config(args.config.as_deref(), &root)?;

    if args.dry_run {
        print_dry_run(&cfg, &root)?;
        return Ok(());
    }

    let ctx = EngineContext::new(
        cfg,
        root.clone(),
        Arc::new(RealFileSystem),
        Arc::new(TokioProcessBackend::new()),
    )?;
    let engine = Engine::start(ctx)?;
    engine.add_sink("log", Arc::new(LogSink));

    if args.once {
        engine.build_test_all().await;
        engine.wait_idle().await;
        engine.shutdown().await;
        return Ok(());
    }

    engine.watch(&token)?;
    info!(root = %root.display(), "watching for changes (Ctrl-C to stop)");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
    info!("shutting down");
    engine.abort("shutdown").await;
    engine.shutdown().await;
    Ok(())
}

fn load_config(explicit: Option<&str>, root: &Path) -> Result<EngineConfig> {
    let path = config_path(explicit, root);
    if explicit.is_none() && !path.exists() {
        debug!(?path, "no config file; using defaults");
        return Ok(default_config(root));
    }
    let cfg = load_and_validate(&path, root)
        .with_context(|| format!("loading config {}", path.display()))?;
    Ok(cfg)
}

/// Print the resolved configuration and build order without running anything.
fn print_dry_run(cfg: &EngineConfig, root: &Path) -> Result<()> {
    let graph = ProjectGraph::from_config(cfg, root)?;
    let all: BTreeSet<String> = graph.projects().map(str::to_string).collect();
    let order = graph.build_order(&all)?;

    println!("watchtest dry-run");
    println!("  root = {}", root.display());
    println!("  engine.debounce_ms = {}", cfg.engine.debounce_ms);
    println!("  engine.deltas = {}", cfg.engine.deltas);
    println!("  engine.optimistic_build = {}", cfg.engine.optimistic_build);
    println!(
        "  engine.triggered_while_running_behaviour = {:?}",
        cfg.engine.triggered_while_running_behaviour
    );
    println!("  engine.queue_length = {}", cfg.engine.queue_length);
    if let Some(provider) = &cfg.engine.provider {
        println!("  engine.provider = {provider}");
    }
    println!("  build.program = {}", cfg.build.program.display());
    println!();

    println!("projects ({}), in build order:", order.len());
    for name in &order {
        let Some(project) = graph.project(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      file: {}", project.file.display());
        if let Some(assembly) = &project.assembly {
            println!("      assembly: {}", assembly.display());
        }
        if !project.framework.is_empty() {
            println!("      framework: {}", project.framework);
        }
        if !project.references.is_empty() {
            println!("      references: {:?}", project.references);
        }
        if !project.watch.is_empty() {
            println!("      watch: {:?}", project.watch);
        }
    }

    for ext in &cfg.extensions {
        println!("extension {}: {:?}", ext.provider, ext.extensions);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
