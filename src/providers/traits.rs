use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Completion backend. One synchronous request per call, no retries; the
/// caller decides what a failure means.
#[async_trait]
pub trait Provider: Send + Sync {
    /// One-shot chat with an optional system prompt. Returns the text of
    /// the first completion choice.
    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;

    /// Warm up the HTTP connection pool and verify the credential.
    /// Default implementation is a no-op.
    async fn warmup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
