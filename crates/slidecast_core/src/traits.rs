//! Boundaries to external collaborators. These are consumed by application
//! code; this workspace never implements them outside of test doubles.

use crate::error::Result;
use async_trait::async_trait;

/// Result of synthesizing narration for one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedNarration {
    pub audio_url: String,
    pub duration_secs: f64,
}

/// Text-to-speech collaborator. Treated as a black box producing an audio
/// asset plus its duration.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<SynthesizedNarration>;
}

/// Document-to-slides collaborator (e.g. PDF rasterization), producing raw
/// slide records for the editing layer.
#[async_trait]
pub trait SlideExtractor: Send + Sync {
    async fn extract(&self, document: &[u8]) -> Result<Vec<crate::types::Slide>>;
}

/// Opaque key-value blob store for project/session state.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn remove(&self, key: &str) -> Result<()>;
}
