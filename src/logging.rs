//! Logging setup for the `tabprep` binary.
//!
//! Console output always; rotating log files when a directory is configured.
//! Library code only emits `tracing` events and never installs a subscriber.
//!
//! ```no_run
//! tabprep::logging::init(None).expect("Failed to initialize logging");
//! tracing::info!("Pipeline started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Default log directory following platform conventions
///
/// - Windows: `%APPDATA%/tabprep/logs`
/// - macOS: `~/Library/Application Support/tabprep/logs`
/// - Linux: `~/.local/share/tabprep/logs`
pub fn default_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("tabprep").join("logs"))
}

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")
}

/// Initializes logging.
///
/// With `log_dir` set, two daily-rotated files are written there as well:
/// `tabprep.<date>.log` with everything and `error.<date>.log` with warnings
/// and errors only. `RUST_LOG` overrides the default `info` level.
///
/// # Errors
///
/// Returns error if the log directory cannot be created, an appender fails,
/// or a global subscriber is already installed.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter()?)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(());
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("tabprep")
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create error-logs file appender")?;

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());

    Ok(())
}
