//! Error types for the annotation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur during video annotation.
///
/// Fatal variants (`SourceUnavailable`, tool discovery, `Cancelled`) abort a
/// run before or mid-stream with no partial output. Per-frame failures
/// (`DetectionFailed`, `EncodingFailed`) are caught by the orchestrator and
/// never surface from a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("FFprobe command failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Frame decode failed: {0}")]
    DecodeFailed(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Frame encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] pitchvision_models::ConfigError),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create a source unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a retry at the network layer could plausibly succeed.
    ///
    /// Only download failures qualify; detection and encoding failures are
    /// handled per frame, not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. } | Self::Io(_))
    }
}
