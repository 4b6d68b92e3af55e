//! Error types for Pinshot
//!
//! This module provides the error hierarchy using `thiserror`. Capture and
//! sweep errors abort the whole operation that raised them; overlay errors
//! stay local to the widget that raised them.

use thiserror::Error;

/// The main error type for Pinshot operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser-related errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Capture errors (viewport capture, sweep, composite, crop)
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Pinned overlay errors
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    /// Image decode/encode errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// The in-page agent script could not be installed
    #[error("Failed to install page agent: {0}")]
    AgentInstallFailed(String),

    /// Script evaluation inside the page failed
    #[error("Page script failed: {0}")]
    ScriptFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),
}

/// Capture pipeline errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No foreground target, or the platform refused the capture
    #[error("Capture unavailable: {0}")]
    Unavailable(String),

    /// A capture step failed part way through a full-page sweep
    #[error("Sweep aborted at step {step} (offset {offset}px): {reason}")]
    SweepAborted {
        /// Zero-based step index that failed
        step: usize,
        /// Scroll offset the step was capturing
        offset: u32,
        /// Underlying failure
        reason: String,
    },

    /// Page reported dimensions a sweep cannot be planned from
    #[error("Invalid page dimensions: {0}")]
    InvalidDimensions(String),

    /// Slices could not be composited
    #[error("Composite failed: {0}")]
    CompositeFailed(String),

    /// Selection could not be cropped out of the source image
    #[error("Crop failed: {0}")]
    CropFailed(String),

    /// Compositor was handed no slices
    #[error("No slices to composite")]
    EmptySweep,

    /// Re-encoding into an export format failed
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

/// Pinned overlay errors
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Writing the image to the clipboard failed
    #[error("Clipboard write failed: {0}")]
    ClipboardWriteFailed(String),

    /// The platform refused picture-in-picture entry
    #[error("Picture-in-picture unavailable: {0}")]
    PipUnavailable(String),

    /// The widget's page surface could not be updated
    #[error("Overlay surface failed: {0}")]
    SurfaceFailed(String),
}

/// Result type alias for Pinshot operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a configuration error from a string
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error should be shown to the user as a toast on the
    /// widget instead of aborting the operation.
    pub fn is_widget_local(&self) -> bool {
        matches!(
            self,
            Error::Overlay(OverlayError::ClipboardWriteFailed(_))
                | Error::Overlay(OverlayError::PipUnavailable(_))
        )
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
