//! Logging setup

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Cannot create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot open log file: {0}")]
    Appender(#[from] InitError),
}

/// Initialize logging with tracing
///
/// Writes `vigil.<date>.log` under `log_dir`, rotated daily, plus colored
/// output on stderr, both filtered by `RUST_LOG` (default `info`). The
/// returned guard flushes the file writer on drop and must outlive the
/// program's work.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, LoggingError> {
    let file_appender = open_appender(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_ids(true),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    Ok(guard)
}

fn open_appender(log_dir: &Path) -> Result<RollingFileAppender, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::LogDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("vigil")
        .filename_suffix("log")
        .build(log_dir)?;
    Ok(appender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_dir_under_a_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = open_appender(&blocker.join("logs")).unwrap_err();
        assert!(matches!(err, LoggingError::LogDir { .. }));
    }

    #[test]
    fn test_appender_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        open_appender(&log_dir).unwrap();
        assert!(log_dir.is_dir());
    }
}
