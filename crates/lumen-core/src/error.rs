//! Error types for the Lumen labeling pipeline.
//!
//! Errors are organized by stage. Every stage error is folded into exactly
//! one [`LabelError`] kind at the request boundary, which is what the HTTP
//! layer renders.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures turning a client payload string into bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// A data-URI header was present but does not declare base64
    #[error("Invalid base64 header")]
    InvalidHeader,

    /// The data portion is not valid base64
    #[error("Base64 decode failed: {0}")]
    Decode(String),
}

/// Image loading errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bytes look like an image container but could not be decoded
    #[error("Image decode failed: {message}")]
    Decode { message: String },

    /// Bytes do not match any known image format
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// Width or height exceeds the configured limit
    #[error("Image too large: {width}x{height} exceeds {max_dim} pixels per side")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_dim: u32,
    },
}

/// Errors raised by a tagger engine.
///
/// `NotLoaded`, `Download` and `FileSizeMismatch` mean the engine cannot
/// serve right now; the remaining kinds are unexpected failures.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Model files are absent and auto-download is disabled, or the
    /// session could not be created from them
    #[error("Model not loaded: {0}")]
    NotLoaded(String),

    /// Fetching a model artifact failed
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// A downloaded artifact does not match its advertised size
    #[error("File size mismatch for {path}: expected {expected} bytes, got {actual}")]
    FileSizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// The ONNX session failed while running
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Anything else (lock poisoning, task join failures)
    #[error("Engine internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this error means the model is unavailable rather than broken.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            EngineError::NotLoaded(_)
                | EngineError::Download { .. }
                | EngineError::FileSizeMismatch { .. }
        )
    }
}

/// The four failure kinds a labeling request can end in.
#[derive(Error, Debug)]
pub enum LabelError {
    /// Token verification rejected the caller
    #[error("Invalid token")]
    Unauthorized,

    /// The request itself is unusable (no images, bad encoding, bad image)
    #[error("{0}")]
    BadRequest(String),

    /// The engine could not serve (model missing, download failure, size mismatch)
    #[error("{0}")]
    EngineUnavailable(String),

    /// Any other failure. The message is for logs only.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PayloadError> for LabelError {
    fn from(err: PayloadError) -> Self {
        LabelError::BadRequest(err.to_string())
    }
}

impl From<PipelineError> for LabelError {
    fn from(err: PipelineError) -> Self {
        LabelError::BadRequest(err.to_string())
    }
}

impl From<EngineError> for LabelError {
    fn from(err: EngineError) -> Self {
        if err.is_unavailable() {
            LabelError::EngineUnavailable(err.to_string())
        } else {
            LabelError::Internal(err.to_string())
        }
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
