// Logging setup.
//
// Release builds run without a console, so everything also goes to
// overlay-hint.log in the working directory. The default level is debug in
// debug builds and info otherwise; RUST_LOG overrides it.

use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

const LOG_FILE: &str = "overlay-hint.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn default_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Initialise logging. Subsequent calls are no-ops.
pub fn init() -> Result<(), LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level()));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(".")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer));
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logging initialized");
    Ok(())
}

/// Fallback when the log file cannot be opened: console only.
pub fn init_console() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
