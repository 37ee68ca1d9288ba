pub mod assets;
pub mod error;
pub mod probe;
pub mod render;

pub use error::{RenderError, Result};
pub use render::{render, RenderProgress, RenderRequest};
