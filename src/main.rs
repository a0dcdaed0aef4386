// Prevents console window in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod app;
mod config;
#[cfg(windows)]
mod dialog;
mod error;
// Only the Win32 front end drives the hook and the window
#[cfg_attr(not(windows), allow(dead_code))]
mod hotkeys;
mod keys;
mod logging;
#[cfg_attr(not(windows), allow(dead_code))]
mod overlay;
#[cfg(windows)]
mod tray;

use std::process::ExitCode;

#[cfg(windows)]
const SINGLE_INSTANCE_MUTEX: &str = "OverlayImageHintMutex\0";

fn main() -> ExitCode {
    if let Err(err) = logging::init() {
        logging::init_console();
        tracing::warn!(%err, "logging to console only");
    }

    if is_already_running() {
        tracing::info!("another instance is running");
        return ExitCode::SUCCESS;
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal");
            report_fatal(&err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(windows)]
fn run() -> Result<(), error::AppError> {
    app::run()
}

/// Without Win32 there is nothing to show; validate the configuration and
/// the image so problems still surface, then bail out.
#[cfg(not(windows))]
fn run() -> Result<(), error::AppError> {
    let loaded = config::load_or_init(&config::settings_path());
    for err in &loaded.warnings {
        tracing::warn!(%err, "settings");
    }
    let image = overlay::bitmap::load_image(&loaded.settings.image_path())?;
    tracing::info!(
        key = %loaded.settings.key_for_show,
        opacity = loaded.settings.opacity().percent(),
        width = image.width(),
        height = image.height(),
        "configuration is valid"
    );
    Err(error::AppError::Unsupported)
}

#[cfg(windows)]
fn report_fatal(err: &error::AppError) {
    dialog::error(&err.to_string());
}

#[cfg(not(windows))]
fn is_already_running() -> bool {
    false
}

#[cfg(not(windows))]
fn report_fatal(err: &error::AppError) {
    eprintln!("overlay-hint: {err}");
}

/// Check if another instance is already running
#[cfg(windows)]
fn is_already_running() -> bool {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{GetLastError, ERROR_ALREADY_EXISTS};
    use windows::Win32::System::Threading::CreateMutexW;

    let name: Vec<u16> = SINGLE_INSTANCE_MUTEX.encode_utf16().collect();

    unsafe {
        // The handle stays open until the process exits
        match CreateMutexW(None, true, PCWSTR(name.as_ptr())) {
            Ok(_) => GetLastError() == ERROR_ALREADY_EXISTS,
            Err(_) => false,
        }
    }
}
