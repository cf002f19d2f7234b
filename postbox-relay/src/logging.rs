//! Process-wide log setup.
//!
//! [`init`] installs the global `tracing` subscriber on first use and hands
//! back a [`LogHandle`]; later calls return a handle to the same sinks.
//! [`LogHandle::shutdown`] flushes the log file before exit.

use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_FILE: OnceLock<Option<Arc<File>>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Handle to the installed log sinks.
#[derive(Debug, Clone)]
pub struct LogHandle {
    file: Option<Arc<File>>,
}

impl LogHandle {
    /// Whether log lines are also written to a file.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Flush buffered output and sync the log file to disk.
    pub fn shutdown(self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &self.file {
            (&**file).flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// The log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    Open {
        /// Path to the log file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Another subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber when invoked for the first time.
///
/// Logs go to stderr and, when `config.file` is set, are appended to that
/// file without ANSI colours. `RUST_LOG` overrides `config.filter`.
/// Repeated calls leave the installed subscriber alone and return a handle
/// to it.
pub fn init(config: &LoggingConfig) -> Result<LogHandle, LoggingError> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(file) = LOG_FILE.get() {
        return Ok(LogHandle { file: file.clone() });
    }

    let file = install_subscriber(config)?;
    let file = LOG_FILE.get_or_init(|| file).clone();
    Ok(LogHandle { file })
}

fn install_subscriber(config: &LoggingConfig) -> Result<Option<Arc<File>>, LoggingError> {
    let filter = build_filter(&config.filter)?;

    let file = match &config.file {
        Some(path) => Some(Arc::new(open_log_file(path)?)),
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    let file_layer = file
        .clone()
        .map(|file| fmt::layer().with_target(true).with_ansi(false).with_writer(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(file)
}

fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive).map_err(|e| LoggingError::Filter(e.to_string())),
    }
}

fn open_log_file(path: &std::path::Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_log_file_reports_path() {
        let err = open_log_file(std::path::Path::new("/nonexistent/dir/server.log")).unwrap_err();
        assert!(matches!(err, LoggingError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/server.log"));
    }

    // The only test that installs the global subscriber.
    #[test]
    fn init_writes_to_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let config = LoggingConfig {
            filter: "info".to_string(),
            file: Some(path.clone()),
        };

        let first = init(&config).unwrap();
        assert!(first.has_file());
        tracing::error!("postbox logging smoke test");

        let second = init(&LoggingConfig::default()).unwrap();
        assert!(second.has_file());

        first.shutdown().unwrap();
        second.shutdown().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("postbox logging smoke test"));
        assert!(!contents.contains('\u{1b}'));
    }
}
