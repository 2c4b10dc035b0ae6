//! Tracing setup for the desktop app
//!
//! Logs go to `<data_dir>/logs/tikz-studio.log` (or the platform equivalent),
//! falling back to stderr when the file cannot be opened.

use config::PathManager;
use std::sync::{Once, OnceLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,tikz_core=debug,tikz_app=debug";

static INIT: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        let Some(path) = PathManager::log_file_path() else {
            eprintln!("[tikz-studio] No log path available, using stderr");
            init_stderr_logging();
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("[tikz-studio] Failed to create log directory {:?}: {}", parent, e);
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path);

        match file {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                // Dropping the guard would stop the writer thread
                let _ = LOG_GUARD.set(guard);

                let subscriber = tracing_subscriber::registry().with(env_filter()).with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                );

                match tracing::subscriber::set_global_default(subscriber) {
                    Ok(()) => tracing::info!("Logging initialized, writing to {:?}", path),
                    Err(e) => eprintln!("[tikz-studio] Failed to set tracing subscriber: {}", e),
                }
            }
            Err(e) => {
                eprintln!("[tikz-studio] Failed to open log file {:?}: {}", path, e);
                init_stderr_logging();
            }
        }
    });
}

fn init_stderr_logging() {
    let subscriber = tracing_subscriber::registry().with(env_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
