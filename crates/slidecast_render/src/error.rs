use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("no slides to render")]
    NoSlides,

    #[error("render aborted")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// User cancellation, as opposed to a real failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, RenderError::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
