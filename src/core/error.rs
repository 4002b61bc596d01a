//! Custom error types for Kinesis
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Kinesis operations
#[derive(Error, Debug)]
pub enum KinesisError {
    /// Session not ready or already closed; fatal to the current call only
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Malformed or disallowed action plan; the plan is discarded entirely
    #[error("invalid action plan: {0}")]
    Validation(String),

    /// Selector or template target could not be resolved
    #[error("target resolution failed: {0}")]
    Resolution(String),

    /// The translation service produced no usable plan
    #[error("translation failed: {0}")]
    Translation(String),

    /// A bounded operation exceeded its ceiling
    #[error("timed out: {0}")]
    Timeout(String),

    /// Browser automation errors
    #[error("browser error: {0}")]
    Browser(String),

    /// OS-level automation errors
    #[error("os automation error: {0}")]
    Os(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// tesseract not installed
    #[error("tesseract not found. Install it and ensure it is on PATH (e.g. apt install tesseract-ocr)")]
    TesseractNotFound,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster decode/encode errors
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Convenience Result type for Kinesis operations
pub type Result<T> = std::result::Result<T, KinesisError>;

impl KinesisError {
    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a plan validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a target resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a translation error
    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create an OS automation error
    pub fn os(msg: impl Into<String>) -> Self {
        Self::Os(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
