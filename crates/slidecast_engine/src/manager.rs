use crate::backend::{
    BackendFactory, ChatMessage, ContentPart, ImageUrl, InferenceBackend, MessageContent, Role,
};
use crate::error::{EngineError, Result};
use crate::models::{find_model, is_vision_model};
use crate::vision;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

// ---------------------------------------------------------------------------
// Status / progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
    Generating,
    Faulted,
}

/// Out-of-band load progress: fraction 0..1 plus a human-readable status.
/// Values published by the manager never regress within one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineProgress {
    pub fraction: f64,
    pub status: String,
}

// ---------------------------------------------------------------------------
// EngineManager
// ---------------------------------------------------------------------------

/// Owns the single process-wide inference session.
///
/// Lifecycle: `Unloaded → Loading → Ready → (Generating → Ready)* →
/// Unloaded`, with `Faulted` reachable mid-generation and recovered by a full
/// backend rebuild. Only one generation may be in flight at a time by
/// contract; batch callers must await each result before issuing the next.
pub struct EngineManager {
    factory: Arc<BackendFactory>,
    state: Mutex<EngineState>,
    progress_tx: watch::Sender<EngineProgress>,
}

struct EngineState {
    backend: Option<Box<dyn InferenceBackend>>,
    model_id: Option<String>,
    status: EngineStatus,
}

impl EngineManager {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Box<dyn InferenceBackend> + Send + Sync + 'static,
    {
        let (progress_tx, _) = watch::channel(EngineProgress::default());
        Self {
            factory: Arc::new(factory),
            state: Mutex::new(EngineState {
                backend: None,
                model_id: None,
                status: EngineStatus::Unloaded,
            }),
            progress_tx,
        }
    }

    /// Watch load progress. Fractions are normalized to the running maximum,
    /// so a consumer never observes a regression even when the underlying
    /// loader reports out of order.
    pub fn subscribe_progress(&self) -> watch::Receiver<EngineProgress> {
        self.progress_tx.subscribe()
    }

    pub async fn status(&self) -> EngineStatus {
        self.state.lock().await.status
    }

    pub async fn loaded_model(&self) -> Option<String> {
        self.state.lock().await.model_id.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        matches!(self.status().await, EngineStatus::Ready)
    }

    /// Load `model_id`, replacing any other loaded model.
    ///
    /// No-op when the same model is already loaded. A load already in flight
    /// for the same model is coalesced: the second caller parks on the state
    /// lock and returns once the first load has finished, without starting a
    /// second one. A failed load fully resets lifecycle state so a retry is
    /// always possible.
    pub async fn load(&self, model_id: &str) -> Result<()> {
        if find_model(model_id).is_none() {
            return Err(EngineError::ModelUnknown(model_id.to_string()));
        }

        let mut state = self.state.lock().await;
        if state.status == EngineStatus::Ready && state.model_id.as_deref() == Some(model_id) {
            return Ok(());
        }

        if let Some(mut previous) = state.backend.take() {
            tracing::info!(
                "unloading {} before loading {model_id}",
                state.model_id.as_deref().unwrap_or("<none>")
            );
            let _ = previous.unload().await;
            state.model_id = None;
        }

        state.status = EngineStatus::Loading;

        // All progress (ours and the backend's) funnels through one raw
        // channel; the forwarder publishes the running maximum.
        let (raw_tx, raw_rx) = watch::channel(EngineProgress::default());
        self.spawn_progress_forwarder(raw_rx);
        let _ = raw_tx.send(EngineProgress {
            fraction: 0.0,
            status: format!("Loading {model_id}"),
        });

        let mut backend = (self.factory)(model_id);
        match backend.load(model_id, raw_tx.clone()).await {
            Ok(()) => {
                state.backend = Some(backend);
                state.model_id = Some(model_id.to_string());
                state.status = EngineStatus::Ready;
                let _ = raw_tx.send(EngineProgress {
                    fraction: 1.0,
                    status: "Initialization complete".to_string(),
                });
                tracing::info!("model {model_id} ready");
                Ok(())
            }
            Err(e) => {
                state.backend = None;
                state.model_id = None;
                state.status = EngineStatus::Unloaded;
                tracing::warn!("load of {model_id} failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Generate text from a chat-style message list. Requires `Ready`.
    ///
    /// The backend's conversational context is reset before the request so
    /// independent per-slide requests are never misread as one long chat
    /// (which would silently accumulate context until generation hangs).
    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut state = self.state.lock().await;
        self.run_generation(&mut state, messages).await
    }

    /// Vision-augmented generation. Fails fast on non-vision models rather
    /// than silently ignoring the image. The image is downscaled and
    /// recompressed before submission; oversized inputs risk exceeding the
    /// engine's memory ceiling and crashing the whole session.
    pub async fn generate_with_image(
        &self,
        messages: Vec<ChatMessage>,
        image_bytes: &[u8],
    ) -> Result<String> {
        let mut state = self.state.lock().await;
        let model_id = state.model_id.clone().ok_or(EngineError::NotReady)?;
        if !is_vision_model(&model_id) {
            return Err(EngineError::VisionUnsupported(model_id));
        }

        let data_uri = vision::prepare_image(image_bytes)?;
        let messages = attach_image(messages, data_uri);
        self.run_generation(&mut state, &messages).await
    }

    /// Explicit teardown. Safe to call in any state.
    pub async fn unload(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut backend) = state.backend.take() {
            if let Err(e) = backend.unload().await {
                tracing::warn!("unload reported: {e}");
            }
        }
        state.model_id = None;
        state.status = EngineStatus::Unloaded;
    }

    async fn run_generation(
        &self,
        state: &mut EngineState,
        messages: &[ChatMessage],
    ) -> Result<String> {
        if state.status != EngineStatus::Ready || state.backend.is_none() {
            return Err(EngineError::NotReady);
        }

        let mut rebuilt = false;
        loop {
            state.status = EngineStatus::Generating;
            let backend = state.backend.as_mut().ok_or(EngineError::NotReady)?;

            let outcome = match backend.reset_context().await {
                Ok(()) => backend.generate(messages).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(text) => {
                    state.status = EngineStatus::Ready;
                    return Ok(text);
                }
                Err(e) if e.is_corruption() && !rebuilt => {
                    rebuilt = true;
                    state.status = EngineStatus::Faulted;
                    tracing::warn!("binding corruption detected, rebuilding engine: {e}");

                    let Some(model_id) = state.model_id.clone() else {
                        return Err(EngineError::NotReady);
                    };
                    if let Some(mut bad) = state.backend.take() {
                        // Best effort; the engine is already in a bad state.
                        let _ = bad.unload().await;
                    }
                    state.model_id = None;

                    // The model is already cached locally, so the rebuild is
                    // fast and needs no progress UI.
                    let (silent_tx, _silent_rx) = watch::channel(EngineProgress::default());
                    let mut fresh = (self.factory)(&model_id);
                    match fresh.load(&model_id, silent_tx).await {
                        Ok(()) => {
                            state.backend = Some(fresh);
                            state.model_id = Some(model_id);
                            state.status = EngineStatus::Ready;
                            tracing::info!("engine rebuilt, retrying generation once");
                        }
                        Err(load_err) => {
                            state.status = EngineStatus::Unloaded;
                            return Err(EngineError::Fault(load_err.to_string()));
                        }
                    }
                }
                Err(e) if e.is_corruption() => {
                    // Second corruption after one rebuild: fatal, no loops.
                    state.status = EngineStatus::Faulted;
                    tracing::error!("corruption persisted after engine rebuild: {e}");
                    return Err(EngineError::Fault(e.to_string()));
                }
                Err(e) => {
                    state.status = EngineStatus::Ready;
                    return Err(e.into());
                }
            }
        }
    }

    fn spawn_progress_forwarder(&self, mut raw_rx: watch::Receiver<EngineProgress>) {
        let public = self.progress_tx.clone();
        tokio::spawn(async move {
            let mut max_fraction = 0.0f64;
            while raw_rx.changed().await.is_ok() {
                let report = raw_rx.borrow_and_update().clone();
                if report.fraction > max_fraction {
                    max_fraction = report.fraction;
                }
                let _ = public.send(EngineProgress {
                    fraction: max_fraction,
                    status: report.status,
                });
            }
        });
    }
}

/// Attach an image data URI to the last user message, converting its content
/// to parts form; appends a bare image message when no user message exists.
fn attach_image(mut messages: Vec<ChatMessage>, data_uri: String) -> Vec<ChatMessage> {
    let image_part = ContentPart::ImageUrl {
        image_url: ImageUrl { url: data_uri },
    };

    if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
        let parts = match &last_user.content {
            MessageContent::Text(text) => vec![
                ContentPart::Text { text: text.clone() },
                image_part,
            ],
            MessageContent::Parts(existing) => {
                let mut parts = existing.clone();
                parts.push(image_part);
                parts
            }
        };
        last_user.content = MessageContent::Parts(parts);
    } else {
        messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![image_part]),
        });
    }
    messages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
