//! Logging Module
//!
//! Structured logging with file output for diagnostics.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "device-console.log";

/// Initialize logging with file output under `data_dir/logs`, plus stderr in
/// debug builds. Safe to call more than once; later calls are ignored.
pub fn init(data_dir: &Path) {
    let log_dir = log_directory(data_dir);

    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_appender);

    // stdout carries command output, so the console layer goes to stderr
    #[cfg(debug_assertions)]
    let console_layer = Some(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .pretty(),
    );

    #[cfg(not(debug_assertions))]
    let console_layer: Option<fmt::Layer<_>> = None;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("debug,hyper=warn,reqwest=warn")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("info,hyper=warn,reqwest=warn")
        }
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}
