//! Message intake: the per-message decision pipeline.
//!
//! Every inbound message walks the same terminal branches: drop empties,
//! throttle inside the cooldown window, intercept crisis language, and
//! only then spend a completion request. Exactly one outbound message per
//! inbound message, or none at all for an empty update.

use crate::cooldown::{CooldownDecision, CooldownTracker};
use crate::reply::{ReplyEngine, FALLBACK_REPLY};
use crate::safety::SafetyFilter;
use std::time::Instant;

/// Sent instead of a generated reply when the safety filter matches.
/// Keeps the Tele MANAS helpline number (14416) in front of the user.
pub const SAFETY_MESSAGE: &str = "Hey, I care about your safety ❤️. If you feel low, please \
reach out to someone you trust or call 14416 (Tele MANAS helpline). You're not alone.";

/// Cooldown rejection template with whole seconds remaining.
pub fn cooldown_message(retry_after_secs: u64) -> String {
    format!("Slow down… try again in {retry_after_secs}s")
}

/// Orchestrates cooldown, safety, and reply generation for one message.
/// Shared via `Arc` and safe under concurrent per-user dispatch; the
/// cooldown tracker is the only mutable state.
pub struct MessageIntake {
    cooldown: CooldownTracker,
    safety: SafetyFilter,
    reply: ReplyEngine,
}

impl MessageIntake {
    pub fn new(cooldown: CooldownTracker, safety: SafetyFilter, reply: ReplyEngine) -> Self {
        Self {
            cooldown,
            safety,
            reply,
        }
    }

    /// Handle one inbound message at the current instant.
    pub async fn handle(&self, user_id: &str, text: &str) -> Option<String> {
        self.handle_at(user_id, text, Instant::now()).await
    }

    /// Handle one inbound message with an explicit timestamp. Returns the
    /// outbound text, or `None` when the update carries no user or text.
    pub async fn handle_at(&self, user_id: &str, text: &str, now: Instant) -> Option<String> {
        if user_id.trim().is_empty() || text.trim().is_empty() {
            tracing::debug!("ignoring update without user or text");
            return None;
        }

        if let CooldownDecision::Throttled { retry_after_secs } =
            self.cooldown.allow_at(user_id, now)
        {
            tracing::debug!(user_id, retry_after_secs, "cooldown rejection");
            return Some(cooldown_message(retry_after_secs));
        }

        if self.safety.classify(text) {
            tracing::info!(user_id, "safety filter intercepted message");
            return Some(SAFETY_MESSAGE.to_string());
        }

        match self.reply.generate(text).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(user_id, "reply generation failed: {e:#}");
                Some(FALLBACK_REPLY.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Provider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        async fn chat_with_system(
            &self,
            _system_prompt: Option<&str>,
            _message: &str,
            _model: &str,
            _temperature: f64,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("upstream down")
            }
            Ok("Take a breath, you've got this.".to_string())
        }
    }

    fn intake(window_secs: u64, fail: bool) -> (MessageIntake, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            calls: calls.clone(),
            fail,
        });
        let intake = MessageIntake::new(
            CooldownTracker::new(Duration::from_secs(window_secs)),
            SafetyFilter::new(),
            ReplyEngine::new(provider, "persona", "model", 0.8),
        );
        (intake, calls)
    }

    #[tokio::test]
    async fn benign_message_gets_the_generated_reply() {
        let (intake, calls) = intake(5, false);
        let out = intake.handle("7", "I feel stressed about exams").await;
        assert_eq!(out.as_deref(), Some("Take a breath, you've got this."));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn banned_term_short_circuits_before_generation() {
        let (intake, calls) = intake(5, false);
        let out = intake.handle("7", "I want to kill myself").await;
        let text = out.unwrap();
        assert_eq!(text, SAFETY_MESSAGE);
        assert!(text.contains("14416"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_message_inside_window_is_throttled() {
        let (intake, calls) = intake(5, false);
        let base = Instant::now();
        intake.handle_at("7", "hello", base).await;

        let out = intake
            .handle_at("7", "hello again", base + Duration::from_secs(2))
            .await;
        assert_eq!(out.as_deref(), Some("Slow down… try again in 3s"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn messages_spaced_past_the_window_both_generate() {
        let (intake, calls) = intake(5, false);
        let base = Instant::now();
        intake.handle_at("7", "hello", base).await;
        let out = intake
            .handle_at("7", "hello again", base + Duration::from_secs(5))
            .await;
        assert_eq!(out.as_deref(), Some("Take a breath, you've got this."));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn throttled_safety_message_still_counts_as_cooldown_hit() {
        // A flagged message that passes the cooldown advances the window
        // like any accepted message.
        let (intake, calls) = intake(5, false);
        let base = Instant::now();
        intake.handle_at("7", "nsfw please", base).await;
        let out = intake
            .handle_at("7", "hello", base + Duration::from_secs(1))
            .await;
        assert_eq!(out.as_deref(), Some("Slow down… try again in 4s"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generation_failure_becomes_the_fallback_reply() {
        let (intake, calls) = intake(5, true);
        let out = intake.handle("7", "hello").await;
        assert_eq!(out.as_deref(), Some(FALLBACK_REPLY));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_text_and_user_are_dropped() {
        let (intake, calls) = intake(5, false);
        assert!(intake.handle("7", "").await.is_none());
        assert!(intake.handle("7", "   ").await.is_none());
        assert!(intake.handle("", "hello").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn distinct_users_do_not_share_a_window() {
        let (intake, calls) = intake(5, false);
        let base = Instant::now();
        intake.handle_at("7", "hello", base).await;
        let out = intake.handle_at("8", "hello", base).await;
        assert_eq!(out.as_deref(), Some("Take a breath, you've got this."));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
