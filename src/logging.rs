use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Encoding of the rolling log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines, no ANSI codes
    #[default]
    Text,
    /// One JSON object per event, for log shippers
    Json,
}

/// Options for [`setup_logging_with_options`].
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Directory for log files (e.g., "logs")
    pub log_dir: &'a str,
    /// Prefix for log files (e.g., "magicmimi")
    pub log_prefix: &'a str,
    /// If true, use debug level; otherwise use info level
    pub debug_mode: bool,
    /// If true, also log to console
    pub console_output: bool,
    pub file_format: LogFormat,
}

/// Setup logging with rotating file appender.
///
/// Logs are written to the specified directory with daily rotation.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_prefix` - Prefix for log files (e.g., "magicmimi")
/// * `debug_mode` - If true, use debug level; otherwise use info level
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &str, log_prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    setup_logging_with_options(&LogOptions {
        log_dir,
        log_prefix,
        debug_mode,
        console_output: false,
        file_format: LogFormat::Text,
    })
}

/// Install the global subscriber: env filter, rolling file layer, optional console layer.
///
/// `RUST_LOG` takes precedence over `debug_mode` when set.
pub fn setup_logging_with_options(options: &LogOptions<'_>) -> Result<WorkerGuard> {
    ensure_log_dir(options.log_dir)?;

    // Create daily rotating file appender
    let file_appender = rolling::daily(options.log_dir, options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = match options.file_format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(false)
            .boxed(),
    };

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, format={:?}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.file_format
    );

    Ok(guard)
}

fn env_filter(debug_mode: bool) -> EnvFilter {
    let default_level = if debug_mode { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn ensure_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8Path::new(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}
