//! Runtime configuration, loaded once at startup.
//!
//! Resolution order: explicit `--config` path → `MANASBOT_CONFIG` env →
//! `~/.manasbot/config.toml`. A missing file falls back to defaults; the
//! required credentials must then come from the environment. Environment
//! variables always win over file values, and validation runs before the
//! process starts serving, so a missing credential is a fatal startup
//! error rather than a runtime surprise.

use anyhow::{bail, Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default completion model served by Groq.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
/// Default sampling temperature for replies.
pub const DEFAULT_TEMPERATURE: f64 = 0.8;
/// Default cap on generated tokens per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 800;
/// Minimum seconds between two accepted messages from the same user.
pub const DEFAULT_COOLDOWN_SECS: u64 = 5;
/// Groq exposes an OpenAI-compatible completions API under this base.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
/// Telegram Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// System persona sent with every completion request.
pub const DEFAULT_PERSONA_PROMPT: &str = "\
You are Manas, a warm, casual, and understanding companion for college students.

Your personality:
- Calm, friendly, and comforting.
- Speak like a supportive senior, not a therapist or a teacher.
- Keep replies short, natural, and varied so they never feel canned.
- Focus on listening and helping the user feel lighter.

Safety rules:
If a user expresses self-harm, suicidal thoughts, or intentions to harm others:
- Shift to a gentle, caring, non-judgmental tone.
- Encourage them to reach out to someone they trust.
- Share ONLY official Government of India helplines when asked for help:
  Tele MANAS: 14416, National Mental Health Helpline: 1-800-891-4416.
- Never give advice or instructions. Express care and point them to real support.";

/// Which inbound transport to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Long-poll the Telegram Bot API for updates.
    #[default]
    Poll,
    /// Serve an HTTP webhook endpoint and let Telegram push updates.
    Webhook,
}

impl Transport {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "webhook" => Ok(Self::Webhook),
            other => bail!("Unknown transport '{other}'. Expected 'poll' or 'webhook'"),
        }
    }
}

/// Webhook gateway bind settings (`[gateway]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Top-level manasbot configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the loaded config file - computed, not serialized.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    /// Groq API key. Overridden by `GROQ_API_KEY`.
    pub groq_api_key: Option<String>,
    /// Telegram bot token. Overridden by `TELEGRAM_TOKEN`.
    pub bot_token: Option<String>,
    /// Completion model identifier.
    pub model: String,
    /// Sampling temperature (0.0-2.0).
    pub temperature: f64,
    /// Maximum output tokens per completion.
    pub max_tokens: u32,
    /// System persona sent with every completion request.
    pub persona_prompt: String,
    /// Per-user cooldown window in seconds. `0` disables the cooldown.
    pub cooldown_secs: u64,
    /// Completions API base URL. Override for proxies or tests.
    pub api_base: String,
    /// Telegram Bot API base URL. Override for local Bot API servers or tests.
    pub telegram_api_base: String,
    /// Inbound transport: `poll` (default) or `webhook`.
    pub transport: Transport,
    /// Webhook gateway bind settings.
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            groq_api_key: None,
            bot_token: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            persona_prompt: DEFAULT_PERSONA_PROMPT.to_string(),
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            api_base: GROQ_API_BASE.to_string(),
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
            transport: Transport::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: optional TOML file, then environment overrides,
    /// then validation. Fails before serving on any invalid value.
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_path(path_override) {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let mut config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                config.config_path = Some(path);
                config
            }
            _ => Config::default(),
        };

        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(path_override: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = path_override {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("MANASBOT_CONFIG") {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        UserDirs::new().map(|u| u.home_dir().join(".manasbot").join("config.toml"))
    }

    /// Apply environment overrides through a lookup function. Split out from
    /// `load` so tests can inject variables without touching process state.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let nonempty = |value: String| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        };

        if let Some(key) = get("GROQ_API_KEY").and_then(nonempty) {
            self.groq_api_key = Some(key);
        }
        if let Some(token) = get("TELEGRAM_TOKEN").and_then(nonempty) {
            self.bot_token = Some(token);
        }
        if let Some(model) = get("MANASBOT_MODEL").and_then(nonempty) {
            self.model = model;
        }
        if let Some(raw) = get("MANASBOT_TEMPERATURE").and_then(nonempty) {
            self.temperature = raw
                .parse()
                .with_context(|| format!("Invalid MANASBOT_TEMPERATURE: {raw}"))?;
        }
        if let Some(raw) = get("MANASBOT_MAX_TOKENS").and_then(nonempty) {
            self.max_tokens = raw
                .parse()
                .with_context(|| format!("Invalid MANASBOT_MAX_TOKENS: {raw}"))?;
        }
        if let Some(persona) = get("MANASBOT_PERSONA").and_then(nonempty) {
            self.persona_prompt = persona;
        }
        if let Some(raw) = get("MANASBOT_COOLDOWN_SECS").and_then(nonempty) {
            self.cooldown_secs = raw
                .parse()
                .with_context(|| format!("Invalid MANASBOT_COOLDOWN_SECS: {raw}"))?;
        }
        if let Some(base) = get("MANASBOT_API_BASE").and_then(nonempty) {
            self.api_base = base;
        }
        if let Some(base) = get("MANASBOT_TELEGRAM_API_BASE").and_then(nonempty) {
            self.telegram_api_base = base;
        }
        if let Some(raw) = get("MANASBOT_TRANSPORT").and_then(nonempty) {
            self.transport = Transport::parse(&raw)?;
        }
        Ok(())
    }

    /// Validate required credentials and value ranges. Called once at
    /// startup; nothing re-reads the environment after this.
    pub fn validate(&self) -> Result<()> {
        if self.groq_api_key.as_deref().is_none_or(str::is_empty) {
            bail!("Groq API key not set. Set GROQ_API_KEY or add groq_api_key to config.toml");
        }
        if self.bot_token.as_deref().is_none_or(str::is_empty) {
            bail!("Telegram bot token not set. Set TELEGRAM_TOKEN or add bot_token to config.toml");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            );
        }
        if self.max_tokens == 0 {
            bail!("max_tokens must be greater than zero");
        }
        if self.persona_prompt.trim().is_empty() {
            bail!("persona_prompt must not be empty");
        }
        Ok(())
    }
}
