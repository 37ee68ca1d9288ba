use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("narration synthesis failed: {0}")]
    Synthesis(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid slide: {0}")]
    InvalidSlide(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
