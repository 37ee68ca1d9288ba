pub mod backend;
pub mod error;
pub mod http;
pub mod manager;
pub mod models;
pub mod script;
pub mod scrub;
pub mod vision;

pub use backend::{ChatMessage, ContentPart, InferenceBackend, MessageContent, Role};
pub use error::{EngineError, Result};
pub use manager::{EngineManager, EngineProgress, EngineStatus};
pub use models::{is_vision_model, ModelInfo, AVAILABLE_MODELS};
