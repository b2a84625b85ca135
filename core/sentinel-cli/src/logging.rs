//! Tracing setup for the binary.
//!
//! Commands and the stdio server log to stderr because stdout carries their
//! output. The watcher daemon writes to the watch log through a
//! non-blocking appender whose guard must outlive `main`.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HOTRELOAD_SENTINEL_LOG";
const DEBUG_ENV: &str = "HOTRELOAD_SENTINEL_DEBUG";

pub const DAEMON_DEFAULT_LEVEL: &str = "info";
pub const COMMAND_DEFAULT_LEVEL: &str = "warn";

fn debug_requested(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )
    })
}

fn build_filter(default_level: &str) -> EnvFilter {
    if debug_requested(std::env::var(DEBUG_ENV).ok().as_deref()) {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub fn init_stderr(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Logs to `path` (appending). Falls back to stderr when the file can't be
/// opened.
pub fn init_file(path: &Path, default_level: &str) -> Option<WorkerGuard> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            init_stderr(default_level);
            tracing::warn!(error = %err, path = %path.display(), "Watch log unavailable, logging to stderr");
            return None;
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_level))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}
