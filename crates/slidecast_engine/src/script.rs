//! Slide-script transformation: turns fragmented slide text into a natural
//! spoken narration script via the loaded local model.

use crate::backend::ChatMessage;
use crate::error::Result;
use crate::manager::EngineManager;
use crate::scrub::scrub_generated_text;

/// System prompt for the narration-script transform. Spoken-form expansions
/// matter because the downstream synthesizer reads the text verbatim.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are creating a conversational script for Text-to-Speech presentation. Transform the following slide text into a complete, natural spoken presentation.

Write in a conversational, engaging style. Use natural transitions and phrases like:
- "Welcome" or "Let's begin" at the start
- "As you can see" or "Notice" when pointing out visual elements
- "Let's explore" or "Now we'll look at" when transitioning
- "This is important because" to highlight key concepts
- "In other words" or "To put it simply" when clarifying

The original text is often fragmented (titles, bullets, metadata) and needs to be connected into coherent, conversational sentences. Do not hallucinate new facts, but strictly "connect the dots" or "fill in the blanks" to make it flow naturally as a spoken presentation.

IMPORTANT TTS INSTRUCTIONS:
1. Expansion: Expand all technical abbreviations into their full spoken form to ensure correct pronunciation.
   - Example: "MiB/s" -> "mebibytes per second"
   - Example: "GB" -> "gigabytes"
   - Example: "vs." -> "versus"
   - Example: "etc." -> "et cetera"
2. URLs and Web Addresses: ALWAYS expand URLs into their spoken form.
   - Replace "://" with "colon slash slash" or simply spell out each part.
   - Replace "/" with "slash" or "forward slash".
   - Replace "." with "dot" or "period".
   - Example: "github.com/user/repo" -> "github dot com slash user slash repo"
   - NEVER read URLs as continuous words. Always spell them out clearly for TTS.
3. Terminal Commands:
   - Do NOT read the leading '$' prompt symbol.
   - Break down complex commands into clear, spoken steps.
   - Spell out important symbols to ensure the listener knows exactly what to type.
   - Example: "$ npm install ." -> "Type npm install space period."
4. Email Addresses: Spell out the @ symbol and dots.
   - Example: "user@example.com" -> "user at example dot com"
5. Punctuation: Use proper punctuation to control pacing.
6. Clean Output: Return ONLY the raw string of the transformed text.
   - Do NOT wrap the output in quotation marks.
   - Do NOT include any prefixes like "Here is the transformed text:" or "Output:".
   - Do NOT use ANY Markdown formatting (no code blocks, no bold with **, no italic with *, no headers with #).
   - Output plain text only."#;

/// Transform raw slide text into a narration script and clean the result.
///
/// One independent request per slide; the manager resets engine context for
/// each, and batch callers must await each transform before the next.
pub async fn transform_script(
    manager: &EngineManager,
    text: &str,
    custom_system_prompt: Option<&str>,
) -> Result<String> {
    let system_prompt = custom_system_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = [
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!("Input Text:\n\"{text}\"")),
    ];

    let raw = manager.generate(&messages).await?;
    Ok(scrub_generated_text(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, InferenceBackend};
    use crate::manager::EngineProgress;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    struct CannedBackend {
        reply: String,
        seen: Arc<Mutex<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl InferenceBackend for CannedBackend {
        async fn load(
            &mut self,
            _model_id: &str,
            _progress: watch::Sender<EngineProgress>,
        ) -> std::result::Result<(), BackendError> {
            Ok(())
        }

        async fn reset_context(&mut self) -> std::result::Result<(), BackendError> {
            Ok(())
        }

        async fn generate(
            &mut self,
            messages: &[ChatMessage],
        ) -> std::result::Result<String, BackendError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            Ok(self.reply.clone())
        }

        async fn unload(&mut self) -> std::result::Result<(), BackendError> {
            Ok(())
        }
    }

    fn manager_replying(reply: &str, seen: Arc<Mutex<Vec<ChatMessage>>>) -> EngineManager {
        let reply = reply.to_string();
        EngineManager::new(move |_| {
            Box::new(CannedBackend {
                reply: reply.clone(),
                seen: seen.clone(),
            }) as Box<dyn InferenceBackend>
        })
    }

    #[tokio::test]
    async fn transform_cleans_model_output() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_replying(
            "Here is the transformed text: **Welcome** to the setup guide",
            seen.clone(),
        );
        manager.load("gemma-2-2b-it-q4f32").await.unwrap();

        let out = transform_script(&manager, "Setup Guide", None).await.unwrap();
        assert_eq!(out, "Welcome to the setup guide.");

        let messages = seen.lock().unwrap().clone();
        assert_eq!(messages.len(), 2);
        match &messages[1].content {
            crate::backend::MessageContent::Text(t) => {
                assert!(t.contains("Setup Guide"));
            }
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_prompt_overrides_default() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_replying("Fine.", seen.clone());
        manager.load("gemma-2-2b-it-q4f32").await.unwrap();

        transform_script(&manager, "text", Some("Answer tersely."))
            .await
            .unwrap();

        let messages = seen.lock().unwrap().clone();
        match &messages[0].content {
            crate::backend::MessageContent::Text(t) => assert_eq!(t, "Answer tersely."),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_custom_prompt_falls_back_to_default() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_replying("Fine.", seen.clone());
        manager.load("gemma-2-2b-it-q4f32").await.unwrap();

        transform_script(&manager, "text", Some("   ")).await.unwrap();

        let messages = seen.lock().unwrap().clone();
        match &messages[0].content {
            crate::backend::MessageContent::Text(t) => {
                assert!(t.contains("Text-to-Speech presentation"));
            }
            other => panic!("expected text content, got {other:?}"),
        }
    }
}
