use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::Result;

const DEFAULT_MAX_LOG_FILES: usize = 5;
const DEFAULT_FILTER: &str = "info";

/// Rolling `info` and `error` log files under one directory
pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

/// Keeps the non-blocking writers flushing. Drop it last.
pub struct LogGuards {
    _info: WorkerGuard,
    _error: WorkerGuard,
}

impl FileLogger {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
            max_files: DEFAULT_MAX_LOG_FILES,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    fn appender(&self, prefix: &str) -> Result<(NonBlocking, WorkerGuard)> {
        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(prefix)
            .filename_suffix("log")
            .max_log_files(self.max_files)
            .build(&self.log_directory)?;
        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Installs the global subscriber: console output plus the two log files.
/// `RUST_LOG` overrides the default `info` filter.
pub fn setup_logging(file_logger: &FileLogger) -> Result<LogGuards> {
    std::fs::create_dir_all(&file_logger.log_directory)?;

    let (info_writer, info_guard) = file_logger.appender("info")?;
    let (error_writer, error_guard) = file_logger.appender("error")?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(info_writer)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR),
        )
        .init();

    Ok(LogGuards {
        _info: info_guard,
        _error: error_guard,
    })
}
