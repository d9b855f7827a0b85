// src/logging.rs

//! Logging setup for `watchtest` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection:
//! 1. `--log-level` applies to `watchtest` itself; dependencies (notify,
//!    globset, ...) stay at `warn` so a debug session is not drowned in
//!    watcher internals.
//! 2. Otherwise `WATCHTEST_LOG` is read as a full `EnvFilter` directive
//!    string, e.g. `debug` or `watchtest::runners=trace,notify=info`.
//! 3. Default: `info` for `watchtest`, `warn` for everything else.
//!
//! Logs go to STDERR; stdout belongs to `--dry-run` output.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "WATCHTEST_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(crate_directive(level)),
        None => filter_from_env(std::env::var(LOG_ENV).ok().as_deref()),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn crate_directive(level: LogLevel) -> String {
    format!("warn,watchtest={}", level_name(level))
}

/// Invalid directive strings fall back to the default filter.
fn filter_from_env(value: Option<&str>) -> EnvFilter {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(crate_directive(LogLevel::Info)))
}
