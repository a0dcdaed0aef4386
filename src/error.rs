use crate::overlay::bitmap::ImageLoadError;

/// Failures that end the run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Image(#[from] ImageLoadError),
    #[cfg(windows)]
    #[error(transparent)]
    Overlay(#[from] crate::overlay::window::OverlayError),
    #[error("overlay-hint only runs on Windows")]
    #[cfg_attr(windows, allow(dead_code))]
    Unsupported,
}
