//! Media toolkit errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// `ffmpeg` or `ffprobe` is not on `PATH`.
    #[error("{0} not found in PATH")]
    ToolMissing(&'static str),

    /// FFmpeg exited unsuccessfully. `stderr` holds the last diagnostic lines.
    #[error("FFmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video: {0}")]
    InvalidVideo(String),

    #[error("no frames in {0}")]
    NoFrames(PathBuf),

    #[error("FFmpeg killed after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unreadable ffprobe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("frame image: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Internal(String),
}

impl MediaError {
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

    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the source material is at fault rather than the tooling:
    /// missing or unreadable videos, empty frame directories and frames
    /// that fail to decode. Image encoding failures are not input errors.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::FileNotFound(_) | Self::InvalidVideo(_) | Self::NoFrames(_) => true,
            Self::Image(e) => !matches!(e, image::ImageError::Encoding(_)),
            _ => false,
        }
    }
}
