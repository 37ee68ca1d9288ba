use crate::backend::{BackendError, ChatMessage, InferenceBackend};
use crate::manager::EngineProgress;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for an OpenAI-compatible local inference runtime
/// (llama.cpp server class). `base_url` should include the API prefix,
/// e.g. `http://127.0.0.1:8080/v1`.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Output cap preventing runaway generation and context overflow.
    pub max_tokens: u32,
    /// Minimum delay between successive requests. Only needed against
    /// remote, externally rate-limited endpoints; local runtimes leave it
    /// unset.
    pub request_gap: Option<Duration>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
            request_gap: None,
        }
    }
}

/// Chat-completions client backend. The wire protocol is stateless per
/// request, so `reset_context` has nothing to clear; stateful native
/// backends are the reason the trait method exists.
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: reqwest::Client,
    model: Option<String>,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            model: None,
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model.as_deref().unwrap_or_default(),
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
        })
    }
}

/// Ensure the endpoint targets `/chat/completions`, tolerating base URLs
/// with or without trailing slashes.
fn chat_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/chat/completions")
    }
}

fn models_endpoint(base_url: &str) -> String {
    format!("{}/models", base_url.trim_end_matches('/'))
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn load(
        &mut self,
        model_id: &str,
        progress: watch::Sender<EngineProgress>,
    ) -> Result<(), BackendError> {
        let _ = progress.send(EngineProgress {
            fraction: 0.25,
            status: "Connecting to inference runtime".to_string(),
        });

        let mut request = self.client.get(models_endpoint(&self.config.base_url));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Load(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BackendError::Load(format!(
                "model listing failed: {}",
                response.status()
            )));
        }

        let listing: ModelsResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Load(e.to_string()))?;
        if !listing.data.iter().any(|m| m.id == model_id) {
            tracing::warn!("runtime does not list model {model_id}, proceeding anyway");
        }

        let _ = progress.send(EngineProgress {
            fraction: 0.9,
            status: format!("Model {model_id} available"),
        });

        self.model = Some(model_id.to_string());
        Ok(())
    }

    async fn reset_context(&mut self) -> Result<(), BackendError> {
        // Stateless per request; nothing server-side to clear.
        Ok(())
    }

    async fn generate(&mut self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        if let Some(gap) = self.config.request_gap {
            tokio::time::sleep(gap).await;
        }

        let mut request = self
            .client
            .post(chat_endpoint(&self.config.base_url))
            .json(&self.request_body(messages));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            return Err(BackendError::Generation(detail));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Generation(e.to_string()))?;

        Ok(reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn unload(&mut self) -> Result<(), BackendError> {
        self.model = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantReply,
}

#[derive(Debug, Deserialize)]
struct AssistantReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_endpoint_normalization() {
        assert_eq!(
            chat_endpoint("http://127.0.0.1:8080/v1"),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://127.0.0.1:8080/v1///"),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://host/v1/chat/completions"),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn models_endpoint_normalization() {
        assert_eq!(
            models_endpoint("http://127.0.0.1:8080/v1/"),
            "http://127.0.0.1:8080/v1/models"
        );
    }

    #[test]
    fn request_body_shape() {
        let mut backend = HttpBackend::new(HttpBackendConfig::default());
        backend.model = Some("gemma-2-2b-it-q4f32".to_string());

        let body = backend.request_body(&[
            ChatMessage::system("You narrate slides."),
            ChatMessage::user("Slide text"),
        ]);

        assert_eq!(body["model"], "gemma-2-2b-it-q4f32");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Slide text");
    }

    #[test]
    fn chat_response_parses_content() {
        let json = r#"{
            "choices": [
                { "message": { "role": "assistant", "content": "Welcome to the guide." } }
            ]
        }"#;
        let reply: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            reply.choices[0].message.content.as_deref(),
            Some("Welcome to the guide.")
        );
    }

    #[test]
    fn error_response_parses_message() {
        let json = r#"{ "error": { "message": "model not loaded" } }"#;
        let err: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error.unwrap().message, "model not loaded");
    }
}
