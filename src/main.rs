#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use manasbot::channels::{self, TelegramChannel};
use manasbot::config::{Config, Transport};
use manasbot::cooldown::CooldownTracker;
use manasbot::gateway::{self, AppState};
use manasbot::intake::MessageIntake;
use manasbot::providers::{self, Provider};
use manasbot::reply::ReplyEngine;
use manasbot::safety::SafetyFilter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// `manasbot` - a warm Telegram companion for college students.
#[derive(Parser, Debug)]
#[command(name = "manasbot")]
#[command(version)]
#[command(about = "A warm Telegram companion for college students.", long_about = None)]
struct Cli {
    /// Path to config.toml (default: ~/.manasbot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot with the configured transport (poll or webhook)
    Start,
    /// Run the webhook gateway regardless of the configured transport
    Gateway,
    /// Check Telegram and completion-service connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Start => match config.transport {
            Transport::Poll => run_poll(&config).await,
            Transport::Webhook => run_webhook(&config).await,
        },
        Commands::Gateway => run_webhook(&config).await,
        Commands::Doctor => run_doctor(&config).await,
    }
}

fn build_runtime(config: &Config) -> (Arc<MessageIntake>, Arc<TelegramChannel>) {
    let provider = providers::create_provider(config);
    let intake = Arc::new(MessageIntake::new(
        CooldownTracker::new(Duration::from_secs(config.cooldown_secs)),
        SafetyFilter::new(),
        ReplyEngine::new(
            provider,
            config.persona_prompt.clone(),
            config.model.clone(),
            config.temperature,
        ),
    ));

    let bot_token = config.bot_token.clone().unwrap_or_default();
    let channel = Arc::new(
        TelegramChannel::new(bot_token).with_api_base(config.telegram_api_base.clone()),
    );

    (intake, channel)
}

async fn run_poll(config: &Config) -> Result<()> {
    let (intake, channel) = build_runtime(config);
    tracing::info!(model = %config.model, "starting poll transport");
    channels::run_poll_loop(channel, intake).await
}

async fn run_webhook(config: &Config) -> Result<()> {
    let (intake, channel) = build_runtime(config);
    let state = AppState { intake, channel };
    tracing::info!(model = %config.model, "starting webhook transport");
    gateway::run_gateway(&config.gateway.host, config.gateway.port, state).await
}

async fn run_doctor(config: &Config) -> Result<()> {
    use manasbot::channels::Channel;

    let (_, channel) = build_runtime(config);
    let provider = providers::create_provider(config);

    let mut healthy = true;

    if channel.health_check().await {
        println!("✅ Telegram Bot API reachable");
    } else {
        println!("❌ Telegram Bot API unreachable (check TELEGRAM_TOKEN)");
        healthy = false;
    }

    match provider.warmup().await {
        Ok(()) => println!("✅ Completion service reachable"),
        Err(e) => {
            println!("❌ Completion service unreachable: {e:#}");
            healthy = false;
        }
    }

    if !healthy {
        bail!("doctor found problems");
    }
    Ok(())
}
