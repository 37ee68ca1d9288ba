use crate::manager::EngineProgress;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Chat message types (OpenAI-compatible wire shape)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Plain text, or mixed text+image parts for vision models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("backend transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Native-binding corruption class: the runtime's internal state is
    /// inconsistent and only a full engine teardown/rebuild recovers it.
    /// Detected by the error signature the binding layer emits.
    pub fn is_corruption(&self) -> bool {
        match self {
            BackendError::Generation(msg) => {
                msg.contains("BindingError") || msg.contains("VectorInt")
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// InferenceBackend
// ---------------------------------------------------------------------------

/// A single local-inference session. The manager owns exactly one at a time
/// and rebuilds it wholesale on corruption faults; backends never need to
/// self-heal.
///
/// Implementations are not required to tolerate concurrent in-flight
/// requests; the manager's callers serialize generation by contract.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Load (or attach to) the given model. Raw progress reports go to
    /// `progress`; they need not be monotonic, the manager normalizes them.
    async fn load(
        &mut self,
        model_id: &str,
        progress: watch::Sender<EngineProgress>,
    ) -> Result<(), BackendError>;

    /// Drop all conversational context. Called before every generation so
    /// independent requests are never misread as a continuing chat.
    async fn reset_context(&mut self) -> Result<(), BackendError>;

    async fn generate(&mut self, messages: &[ChatMessage]) -> Result<String, BackendError>;

    async fn unload(&mut self) -> Result<(), BackendError>;
}

/// Builds a fresh backend for a model id. Used for the initial load and for
/// fault-recovery rebuilds.
pub type BackendFactory = dyn Fn(&str) -> Box<dyn InferenceBackend> + Send + Sync;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
