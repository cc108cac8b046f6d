//! Reply generation against the completion service.
//!
//! Failures stay visible as [`GenerationError`] up to the intake boundary,
//! where they collapse into the fixed fallback text. No retries anywhere:
//! a failed generation costs the user one "try again" message.

use crate::providers::Provider;
use std::sync::Arc;
use thiserror::Error;

/// Shown to the user when the completion service fails in any way.
pub const FALLBACK_REPLY: &str =
    "Hmm, something went wrong while I was thinking. Try again in a bit?";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Upstream(#[source] anyhow::Error),
    #[error("completion service returned no text")]
    Empty,
}

/// Packages the persona prompt plus the user's text into one completion
/// request with fixed generation parameters.
pub struct ReplyEngine {
    provider: Arc<dyn Provider>,
    persona_prompt: String,
    model: String,
    temperature: f64,
}

impl ReplyEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        persona_prompt: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            provider,
            persona_prompt: persona_prompt.into(),
            model: model.into(),
            temperature,
        }
    }

    /// One synchronous completion request; the trimmed first choice on
    /// success.
    pub async fn generate(&self, user_text: &str) -> Result<String, GenerationError> {
        let text = self
            .provider
            .chat_with_system(
                Some(&self.persona_prompt),
                user_text,
                &self.model,
                self.temperature,
            )
            .await
            .map_err(GenerationError::Upstream)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text.to_string())
    }
}
