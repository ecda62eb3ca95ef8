//! Tracing setup
//!
//! Logs go to `<data dir>/logs/relay.log`, or to stderr when that file
//! cannot be opened.

use config::PathManager;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,relay_core=debug,llm=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered lines are flushed.
pub fn init_logging() -> Option<WorkerGuard> {
    let Some(path) = PathManager::log_file_path() else {
        eprintln!("[relay] No log path configured, using stderr");
        init_stderr_logging();
        return None;
    };

    match open_log_file(&path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let subscriber = tracing_subscriber::registry().with(filter()).with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            );
            match tracing::subscriber::set_global_default(subscriber) {
                Ok(()) => {
                    tracing::info!("Logging initialized, writing to {:?}", path);
                    Some(guard)
                }
                Err(e) => {
                    eprintln!("[relay] Failed to set tracing subscriber: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            eprintln!("[relay] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging();
            None
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

fn init_stderr_logging() {
    let subscriber = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[relay] Failed to set tracing subscriber: {}", e);
    }
}
