//! Channel runtime: connects a messaging platform to the intake pipeline.
//!
//! The listener feeds an mpsc queue; every inbound message is dispatched
//! onto its own tokio task, so one slow completion call never stalls other
//! users' messages. `/start` and `/help` are answered with static text at
//! this layer and never reach the intake pipeline.

pub mod telegram;
pub mod traits;

pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelMessage};

use crate::intake::MessageIntake;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Bound on queued inbound messages before the listener backpressures.
const INBOUND_QUEUE_CAPACITY: usize = 64;

/// Greeting for `/start`, sent with light markup.
pub const START_GREETING: &str = "*Hey, I'm Manas* 👋\n\
I'm here to listen when college gets heavy. Tell me what's on your mind, \
or send /help to see how this works.";

/// Static onboarding text for `/help`.
pub const HELP_TEXT: &str = "Just send me a message and I'll reply. \
I keep things short and honest. If you're in crisis, please call 14416 \
(Tele MANAS helpline) or talk to someone you trust.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BotCommand {
    Start,
    Help,
}

/// Recognize `/start` and `/help`, including the `/start@BotName` form
/// Telegram uses in group chats.
fn parse_command(text: &str) -> Option<BotCommand> {
    let first = text.trim().split_whitespace().next()?;
    let base = first.split('@').next().unwrap_or(first);
    match base {
        "/start" => Some(BotCommand::Start),
        "/help" => Some(BotCommand::Help),
        _ => None,
    }
}

/// Run the poll transport until the listener stops.
pub async fn run_poll_loop(channel: Arc<dyn Channel>, intake: Arc<MessageIntake>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<ChannelMessage>(INBOUND_QUEUE_CAPACITY);

    let listener = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.listen(tx).await })
    };

    while let Some(msg) = rx.recv().await {
        let channel = channel.clone();
        let intake = intake.clone();
        tokio::spawn(async move {
            dispatch_message(channel.as_ref(), &intake, msg).await;
        });
    }

    // The sender half was dropped: surface whatever ended the listener.
    listener.await??;
    Ok(())
}

/// Handle one inbound message end to end. Send failures are logged and
/// swallowed; nothing at this layer may take the process down.
pub(crate) async fn dispatch_message(
    channel: &dyn Channel,
    intake: &MessageIntake,
    msg: ChannelMessage,
) {
    let result = match parse_command(&msg.content) {
        Some(BotCommand::Start) => channel.send_markdown(START_GREETING, &msg.reply_target).await,
        Some(BotCommand::Help) => channel.send(HELP_TEXT, &msg.reply_target).await,
        None => match intake.handle(&msg.sender, &msg.content).await {
            Some(outbound) => channel.send(&outbound, &msg.reply_target).await,
            None => return,
        },
    };

    if let Err(e) = result {
        tracing::warn!(
            "{} send failed for {}: {e:#}",
            channel.name(),
            msg.reply_target
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::CooldownTracker;
    use crate::providers::Provider;
    use crate::reply::ReplyEngine;
    use crate::safety::SafetyFilter;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn start_and_help_commands_are_recognized() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command("  /help  "), Some(BotCommand::Help));
        assert_eq!(parse_command("/start@ManasBot"), Some(BotCommand::Start));
        assert_eq!(parse_command("/start now"), Some(BotCommand::Start));
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("tell me about /start"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
    }

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        async fn chat_with_system(
            &self,
            _system_prompt: Option<&str>,
            message: &str,
            _model: &str,
            _temperature: f64,
        ) -> anyhow::Result<String> {
            Ok(format!("echo: {message}"))
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
        markdown_sends: AtomicUsize,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, text: &str, recipient: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_markdown(&self, text: &str, recipient: &str) -> anyhow::Result<()> {
            self.markdown_sends.fetch_add(1, Ordering::SeqCst);
            self.send(text, recipient).await
        }

        async fn listen(
            &self,
            _tx: mpsc::Sender<ChannelMessage>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_intake() -> MessageIntake {
        MessageIntake::new(
            CooldownTracker::new(Duration::from_secs(0)),
            SafetyFilter::new(),
            ReplyEngine::new(Arc::new(EchoProvider), "persona", "model", 0.8),
        )
    }

    fn message(content: &str) -> ChannelMessage {
        ChannelMessage {
            sender: "42".into(),
            reply_target: "42".into(),
            content: content.into(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn start_command_sends_the_greeting_with_markup() {
        let channel = RecordingChannel::default();
        let intake = test_intake();
        dispatch_message(&channel, &intake, message("/start")).await;

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, START_GREETING);
        assert_eq!(channel.markdown_sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn help_command_sends_static_text() {
        let channel = RecordingChannel::default();
        let intake = test_intake();
        dispatch_message(&channel, &intake, message("/help")).await;

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, HELP_TEXT);
    }

    #[tokio::test]
    async fn plain_text_goes_through_intake() {
        let channel = RecordingChannel::default();
        let intake = test_intake();
        dispatch_message(&channel, &intake, message("how are you")).await;

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert_eq!(sent[0].1, "echo: how are you");
    }

    #[tokio::test]
    async fn empty_message_produces_no_outbound() {
        let channel = RecordingChannel::default();
        let intake = test_intake();
        dispatch_message(&channel, &intake, message("   ")).await;
        assert!(channel.sent.lock().is_empty());
    }
}
