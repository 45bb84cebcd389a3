//! Logging setup: a stderr layer for command-line runs and a daily rolling file layer.
//!
//! The interactive form never logs to stderr since that would draw over the terminal UI.

use crate::error::{ReclimitError, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive, e.g. "info" or "reclimit=debug".
    pub directive: String,
    pub stderr: bool,
    pub file: bool,
}

/// Pick the filter directive: command line first, then RUST_LOG, then the config file.
pub fn resolve_directive(cli: Option<&str>, env: Option<&str>, config: &str) -> String {
    cli.or(env)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(config)
        .to_string()
}

/// Gets the log directory path based on platform conventions, creating it when needed.
///
/// - Linux: `~/.local/share/<app>/logs`
/// - macOS: `~/Library/Application Support/<app>/logs`
/// - Windows: `%APPDATA%/<app>/logs`
pub fn log_dir(app_name: &str) -> Result<PathBuf> {
    let base_dir = dirs::data_dir()
        .ok_or_else(|| ReclimitError::Config("could not determine data directory".into()))?;
    let dir = base_dir.join(app_name).join("logs");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Install the global subscriber. Returns the log directory when file logging is on.
pub fn init(app_name: &str, settings: &LogSettings) -> Result<Option<PathBuf>> {
    let env_filter = EnvFilter::try_new(&settings.directive).map_err(|e| {
        ReclimitError::Config(format!(
            "invalid log level {:?}: {}",
            settings.directive, e
        ))
    })?;

    let stderr_layer = settings.stderr.then(|| {
        fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
    });

    let (file_layer, dir) = if settings.file {
        let dir = log_dir(app_name)?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(10)
            .filename_prefix(app_name)
            .filename_suffix("log")
            .build(&dir)
            .map_err(|e| ReclimitError::Io(std::io::Error::other(e)))?;
        let layer = fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(appender);
        (Some(layer), Some(dir))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ReclimitError::Config(format!("logging already initialized: {}", e)))?;

    if let Some(dir) = &dir {
        tracing::debug!(log_dir = %dir.display(), "file logging enabled");
    }
    Ok(dir)
}
