use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("mpv not found")]
    MpvNotFound,

    #[error("mpv socket did not appear")]
    SocketUnavailable,

    #[error("mpv IPC error: {0}")]
    Ipc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
