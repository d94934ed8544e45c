//! Tracing subscriber setup
//!
//! Console output always; a plain-text log file when `[logging] file` is
//! set. File writes go through a background worker so request handling
//! never blocks on disk.

use anyhow::{Context, Result};
use emo_common::config::LoggingConfig;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes
/// the log file when dropped and must be held for the life of the process.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)))
    };

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Open `path` for appending behind a non-blocking writer
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}
