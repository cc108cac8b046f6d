//! Axum-based webhook transport.
//!
//! `POST /webhook` takes a Telegram update, runs it through intake, and
//! pushes the reply back out through the channel before acknowledging.
//! The endpoint answers `{"ok": true}` on every path: a webhook error
//! response would only make Telegram redeliver the same update.

use crate::channels::{Channel, TelegramChannel};
use crate::intake::MessageIntake;
use anyhow::{Context, Result};
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout. Sits above the completion client's 120s timeout so a
/// generation in flight is never cut off by the HTTP layer.
const REQUEST_TIMEOUT_SECS: u64 = 150;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<MessageIntake>,
    pub channel: Arc<dyn Channel>,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/webhook", post(handle_webhook))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}

/// Bind and serve the gateway until the process exits.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway on {addr}"))?;

    tracing::info!("gateway listening on {addr}");
    axum::serve(listener, router(state))
        .await
        .context("gateway server error")?;
    Ok(())
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "Bot is running!" }))
}

async fn handle_webhook(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Json<serde_json::Value> {
    let ack = Json(serde_json::json!({ "ok": true }));

    let Json(update) = match body {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("webhook JSON parse error: {e}");
            return ack;
        }
    };

    let Some(msg) = TelegramChannel::parse_update_message(&update) else {
        tracing::debug!("webhook update without user or text, ignoring");
        return ack;
    };

    if let Some(outbound) = state.intake.handle(&msg.sender, &msg.content).await {
        if let Err(e) = state.channel.send(&outbound, &msg.reply_target).await {
            tracing::warn!("webhook reply send failed for {}: {e:#}", msg.reply_target);
        }
    }

    ack
}
