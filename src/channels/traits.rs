use async_trait::async_trait;

/// A message received from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Opaque sender identifier, used as the cooldown key.
    pub sender: String,
    /// Where the reply goes (chat id for Telegram).
    pub reply_target: String,
    pub content: String,
    /// Platform timestamp, seconds since the epoch.
    pub timestamp: u64,
}

/// Core channel trait — implement for any messaging platform.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Send a plain-text message through this channel.
    async fn send(&self, text: &str, recipient: &str) -> anyhow::Result<()>;

    /// Send a message with light markup, where the platform supports it.
    /// Default falls back to plain text.
    async fn send_markdown(&self, text: &str, recipient: &str) -> anyhow::Result<()> {
        self.send(text, recipient).await
    }

    /// Start listening for incoming messages (long-running).
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()>;

    /// Check if the channel is healthy.
    async fn health_check(&self) -> bool {
        true
    }
}
