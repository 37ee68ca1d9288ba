use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F16,
    F32,
}

/// One entry in the local-model catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub size: &'static str,
    pub vram_required_mb: u32,
    pub precision: Precision,
}

impl ModelInfo {
    pub fn is_vision(&self) -> bool {
        is_vision_model(self.id)
    }
}

/// Models small enough for a local session. f16 variants are faster and use
/// less memory; f32 variants trade speed for compatibility.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo { id: "llama-3.2-3b-instruct-q4f16", name: "Llama 3.2 3B", size: "1.7GB", vram_required_mb: 2500, precision: Precision::F16 },
    ModelInfo { id: "llama-3.2-1b-instruct-q4f16", name: "Llama 3.2 1B", size: "800MB", vram_required_mb: 1500, precision: Precision::F16 },
    ModelInfo { id: "llama-3.1-8b-instruct-q4f16", name: "Llama 3.1 8B", size: "4.5GB", vram_required_mb: 5000, precision: Precision::F16 },
    ModelInfo { id: "gemma-2-2b-it-q4f16", name: "Gemma 2 2B", size: "1.4GB", vram_required_mb: 2000, precision: Precision::F16 },
    ModelInfo { id: "deepseek-r1-distill-llama-8b-q4f16", name: "DeepSeek R1 Distill 8B", size: "4.5GB", vram_required_mb: 5000, precision: Precision::F16 },
    ModelInfo { id: "qwen2.5-1.5b-instruct-q4f16", name: "Qwen 2.5 1.5B", size: "1GB", vram_required_mb: 2000, precision: Precision::F16 },
    ModelInfo { id: "phi-3.5-mini-instruct-q4f16", name: "Phi 3.5 Mini", size: "2.5GB", vram_required_mb: 3000, precision: Precision::F16 },
    ModelInfo { id: "phi-3.5-vision-instruct-q4f16", name: "Phi 3.5 Vision", size: "3.0GB", vram_required_mb: 3500, precision: Precision::F16 },
    ModelInfo { id: "llama-3.2-3b-instruct-q4f32", name: "Llama 3.2 3B", size: "2.0GB", vram_required_mb: 3000, precision: Precision::F32 },
    ModelInfo { id: "llama-3.2-1b-instruct-q4f32", name: "Llama 3.2 1B", size: "1.0GB", vram_required_mb: 1800, precision: Precision::F32 },
    ModelInfo { id: "gemma-2-2b-it-q4f32", name: "Gemma 2 2B", size: "1.7GB", vram_required_mb: 2500, precision: Precision::F32 },
    ModelInfo { id: "qwen2.5-1.5b-instruct-q4f32", name: "Qwen 2.5 1.5B", size: "1.2GB", vram_required_mb: 2300, precision: Precision::F32 },
    ModelInfo { id: "phi-3.5-mini-instruct-q4f32", name: "Phi 3.5 Mini", size: "3.0GB", vram_required_mb: 3500, precision: Precision::F32 },
    ModelInfo { id: "phi-3.5-vision-instruct-q4f32", name: "Phi 3.5 Vision", size: "3.5GB", vram_required_mb: 4000, precision: Precision::F32 },
];

/// Vision-capable variants are flagged in the model id itself.
pub fn is_vision_model(model_id: &str) -> bool {
    model_id.to_lowercase().contains("vision")
}

pub fn find_model(model_id: &str) -> Option<&'static ModelInfo> {
    AVAILABLE_MODELS.iter().find(|m| m.id == model_id)
}
