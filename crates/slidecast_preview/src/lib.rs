pub mod error;
pub mod mpv;
pub mod session;

pub use error::{PreviewError, Result};
pub use mpv::MpvPlayer;
pub use session::PreviewSession;
