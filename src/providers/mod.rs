//! Completion service adapters.
//!
//! Each backend implements the [`Provider`] trait from [`traits`]. The bot
//! ships with a single Groq adapter (OpenAI-compatible wire format); any
//! other OpenAI-compatible endpoint works through the `api_base` config
//! override.

pub mod groq;
pub mod traits;

pub use groq::GroqProvider;
pub use traits::{ChatMessage, Provider};

use crate::config::Config;
use std::sync::Arc;

const MAX_API_ERROR_CHARS: usize = 200;

/// Build the configured completion provider.
pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    Arc::new(GroqProvider::with_base_url_and_max_tokens(
        Some(&config.api_base),
        config.groq_api_key.as_deref(),
        Some(config.max_tokens),
    ))
}

/// Turn a non-2xx response into an error with a bounded body snippet, so a
/// huge upstream error page never floods the logs.
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(MAX_API_ERROR_CHARS).collect();
    if body.chars().count() > MAX_API_ERROR_CHARS {
        anyhow::anyhow!("{provider} API error ({status}): {snippet}…")
    } else {
        anyhow::anyhow!("{provider} API error ({status}): {snippet}")
    }
}
