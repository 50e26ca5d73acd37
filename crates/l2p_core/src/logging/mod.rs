//! Logging infrastructure for the Level 2 pipeline.
//!
//! This module provides:
//! - Structured [`PipelineEvent`]s and the [`EventSink`] trait the
//!   orchestrator reports through
//! - A per-run logger writing a log file plus an optional callback
//! - A sink forwarding events to the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use l2p_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("level2", "/path/to/logs", LogConfig::default(), None).unwrap();
//! logger.phase("processEimage");
//! logger.command("processEimage.py image_repo/ --id visit=840 ...", false);
//! logger.success("processEimage completed");
//! ```

mod events;
mod run_logger;
mod types;

pub use events::{EventSink, FanOutSink, MemorySink, NullSink, PipelineEvent, TracingSink};
pub use run_logger::RunLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name of the application-wide log inside the logs folder.
pub const APP_LOG_FILE: &str = "level2-pipeline.log";

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(default_filter(default_level))
        .try_init();
}

/// Initialize global tracing with stderr output plus a log file in `logs_dir`.
///
/// Returns a guard that must be held for the life of the program; dropping
/// it flushes the file writer. Falls back to stderr only (and returns
/// `None`) when `logs_dir` cannot be created.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        init_tracing(default_level);
        tracing::warn!("Cannot create logs folder {}: {}", logs_dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::never(logs_dir, APP_LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(file_writer),
        )
        .with(default_filter(default_level))
        .try_init();

    Some(guard)
}

/// Filter from `RUST_LOG`, or `default_level` when it is unset.
pub fn default_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
