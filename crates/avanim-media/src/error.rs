//! Error types for media and animation operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while generating an animation.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Unknown expression type: {0}")]
    UnknownExpression(String),

    #[error("Expression video not found: {}", .0.display())]
    DrivingFileMissing(PathBuf),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an inference failure error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an invalid video error.
    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error comes from the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownExpression(_) | Self::InvalidVideo(_) | Self::Image(_)
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FfmpegNotFound | Self::FfprobeNotFound => "tool_missing",
            Self::FfmpegFailed { .. } | Self::FfprobeFailed { .. } => "ffmpeg",
            Self::ModelNotLoaded(_) => "model_not_loaded",
            Self::UnknownExpression(_) => "unknown_expression",
            Self::DrivingFileMissing(_) | Self::FileNotFound(_) => "file_missing",
            Self::InvalidVideo(_) => "invalid_video",
            Self::Image(_) => "image",
            Self::Inference(_) => "inference",
            Self::Io(_) | Self::JsonParse(_) | Self::Internal(_) => "internal",
        }
    }
}

/// Errors raised while constructing an [`Animator`](crate::Animator).
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model config not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("invalid model config: {0}")]
    InvalidConfig(String),

    #[error("checkpoint not found: {}", .0.display())]
    CheckpointMissing(PathBuf),

    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
}

impl ModelLoadError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

impl From<config::ConfigError> for ModelLoadError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MediaError::UnknownExpression("wink".to_string());
        assert_eq!(err.to_string(), "Unknown expression type: wink");
        assert!(err.is_client_error());

        let err = MediaError::DrivingFileMissing(PathBuf::from("expressions/smile.mp4"));
        assert_eq!(
            err.to_string(),
            "Expression video not found: expressions/smile.mp4"
        );
        assert_eq!(err.kind(), "file_missing");
    }
}
