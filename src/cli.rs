// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchtest`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchtest",
    version,
    about = "Continuously build and test a project tree, reporting only what changed.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory (or file inside the directory) to watch.
    ///
    /// Default: the current working directory.
    #[arg(value_name = "WATCH_TOKEN")]
    pub watch_token: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Watchtest.toml` next to the watch token.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Build and test every project once, then exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHTEST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved projects, but don't watch or run.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
