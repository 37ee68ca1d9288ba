use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not ready: load a model first")]
    NotReady,

    #[error("unknown model id: {0}")]
    ModelUnknown(String),

    #[error("vision generation requires a vision-capable model (loaded: {0})")]
    VisionUnsupported(String),

    #[error("engine fault persisted after rebuild: {0}")]
    Fault(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
