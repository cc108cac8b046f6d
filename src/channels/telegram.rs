use super::traits::{Channel, ChannelMessage};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;
/// Backoff after a transport or parse error in the poll loop.
const POLL_RETRY_SECS: u64 = 5;
/// Backoff after a 409 (another process is polling with this token).
const CONFLICT_RETRY_SECS: u64 = 2;
/// Client-side request timeout; must exceed the long-poll timeout.
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Telegram channel — long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    /// Base URL for the Telegram Bot API. Defaults to `https://api.telegram.org`.
    /// Override for local Bot API servers or testing.
    api_base: String,
    client: Client,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: crate::config::TELEGRAM_API_BASE.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Override the Telegram Bot API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Extract sender id, chat id, and text from a Bot API update. Returns
    /// `None` for anything that is not a plain text message.
    pub fn parse_update_message(update: &serde_json::Value) -> Option<ChannelMessage> {
        let message = update.get("message")?;
        let text = message.get("text").and_then(serde_json::Value::as_str)?;

        let sender = message
            .get("from")
            .and_then(|from| from.get("id"))
            .and_then(serde_json::Value::as_i64)?
            .to_string();

        let reply_target = message
            .get("chat")
            .and_then(|chat| chat.get("id"))
            .and_then(serde_json::Value::as_i64)?
            .to_string();

        let timestamp = message
            .get("date")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_default();

        Some(ChannelMessage {
            sender,
            reply_target,
            content: text.to_string(),
            timestamp,
        })
    }

    async fn send_with_parse_mode(
        &self,
        text: &str,
        chat_id: &str,
        parse_mode: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed ({status}): {err}");
        }

        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str, recipient: &str) -> anyhow::Result<()> {
        self.send_with_parse_mode(text, recipient, None).await
    }

    async fn send_markdown(&self, text: &str, recipient: &str) -> anyhow::Result<()> {
        // Telegram rejects the whole message on malformed markup, so fall
        // back to plain text rather than dropping the reply.
        if self
            .send_with_parse_mode(text, recipient, Some("Markdown"))
            .await
            .is_ok()
        {
            return Ok(());
        }
        tracing::warn!("Telegram sendMessage with Markdown failed; retrying without parse_mode");
        self.send_with_parse_mode(text, recipient, None).await
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"]
            });

            let resp = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                    continue;
                }
            };

            let ok = data
                .get("ok")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            if !ok {
                let error_code = data
                    .get("error_code")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or_default();
                let description = data
                    .get("description")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown Telegram API error");

                if error_code == 409 {
                    tracing::warn!(
                        "Telegram polling conflict (409): {description}. \
Ensure only one `manasbot` process is using this bot token."
                    );
                    tokio::time::sleep(Duration::from_secs(CONFLICT_RETRY_SECS)).await;
                } else {
                    tracing::warn!(
                        "Telegram getUpdates API error (code={error_code}): {description}"
                    );
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                }
                continue;
            }

            if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                for update in results {
                    // Advance offset past this update even if we skip it
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(msg) = Self::parse_update_message(update) else {
                        tracing::debug!("skipping non-text update");
                        continue;
                    };

                    if tx.send(msg).await.is_err() {
                        // Receiver gone: the runtime is shutting down.
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        let timeout_duration = Duration::from_secs(5);

        match tokio::time::timeout(
            timeout_duration,
            self.client.get(self.api_url("getMe")).send(),
        )
        .await
        {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                tracing::debug!("Telegram health check failed: {e}");
                false
            }
            Err(_) => {
                tracing::debug!("Telegram health check timed out after 5s");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_update(update_id: i64, user_id: i64, chat_id: i64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": 100,
                "date": 1_722_000_000_u64,
                "from": { "id": user_id, "is_bot": false, "first_name": "Asha" },
                "chat": { "id": chat_id, "type": "private" },
                "text": text
            }
        })
    }

    #[test]
    fn parses_a_plain_text_update() {
        let update = text_update(9001, 42, 42, "hello there");
        let msg = TelegramChannel::parse_update_message(&update).unwrap();
        assert_eq!(msg.sender, "42");
        assert_eq!(msg.reply_target, "42");
        assert_eq!(msg.content, "hello there");
        assert_eq!(msg.timestamp, 1_722_000_000);
    }

    #[test]
    fn group_chat_replies_to_the_chat_not_the_sender() {
        let update = text_update(9002, 42, -100_500, "hi all");
        let msg = TelegramChannel::parse_update_message(&update).unwrap();
        assert_eq!(msg.sender, "42");
        assert_eq!(msg.reply_target, "-100500");
    }

    #[test]
    fn update_without_text_is_skipped() {
        let update = serde_json::json!({
            "update_id": 9003,
            "message": {
                "from": { "id": 42 },
                "chat": { "id": 42 },
                "photo": [{ "file_id": "abc" }]
            }
        });
        assert!(TelegramChannel::parse_update_message(&update).is_none());
    }

    #[test]
    fn update_without_sender_is_skipped() {
        let update = serde_json::json!({
            "update_id": 9004,
            "message": {
                "chat": { "id": 42 },
                "text": "channel post"
            }
        });
        assert!(TelegramChannel::parse_update_message(&update).is_none());
    }

    #[test]
    fn update_without_message_is_skipped() {
        let update = serde_json::json!({ "update_id": 9005, "edited_message": {} });
        assert!(TelegramChannel::parse_update_message(&update).is_none());
    }

    #[test]
    fn api_url_embeds_the_token() {
        let channel = TelegramChannel::new("123:abc").with_api_base("http://localhost:8081/");
        assert_eq!(
            channel.api_url("sendMessage"),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }
}
