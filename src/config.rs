use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
/// Environment variable that overrides `[llm] provider`.
pub const PROVIDER_VAR: &str = "LLM_PROVIDER";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Chat-session variant: a fresh Gemini chat per message.
    #[default]
    Gemini,
    /// Single-shot completion with a system instruction.
    Openai,
}

impl LlmProvider {
    /// Name of the environment variable carrying this provider's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::Openai => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Gemini => write!(f, "gemini"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::Openai),
            other => bail!("Unknown LLM provider '{}' (expected 'gemini' or 'openai')", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    /// Read from the environment, never from the config file.
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/');
        }
        match self.provider {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }

    pub fn effective_model(&self) -> &str {
        if !self.model.is_empty() {
            return &self.model;
        }
        match self.provider {
            LlmProvider::Gemini => "gemini-pro",
            LlmProvider::Openai => "gpt-3.5-turbo",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(skip)]
    pub bot_token: String,
}

/// User-facing texts. `greeting` may contain a `{mention}` placeholder.
#[derive(Debug, Deserialize, Clone)]
pub struct MessagesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
    #[serde(default = "default_apology")]
    pub apology: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            disclaimer: default_disclaimer(),
            apology: default_apology(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    "You are a helpful assistant replying on behalf of the account owner while they are away. \
     Answer briefly, in the same language the user writes in."
        .to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_greeting() -> String {
    "سلام {mention}! من یک ربات هستم. فعلاً کاربر اصلی آنلاین نیست، ولی من می‌تونم به سوالات شما پاسخ بدم. لطفاً سوالتون رو بپرسید."
        .to_string()
}

fn default_disclaimer() -> String {
    "فعلا کاربر نیست ولی من می‌تونم به سوالاتتون پاسخ بدم:\n".to_string()
}

fn default_apology() -> String {
    "متاسفم، در حال حاضر نمی‌تونم به سوال شما پاسخ بدم. لطفاً دوباره تلاش کنید.".to_string()
}

/// Looks up a required secret; empty values count as missing.
fn require(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match var(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} not found in environment. Please set it.", name),
    }
}

impl Config {
    /// Load settings from `path` (optional) and secrets from the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            info!("Loading configuration from: {}", path.display());
            Some(content)
        } else {
            info!("No config file at {}, using defaults", path.display());
            None
        };

        Self::from_sources(content.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build the config from optional TOML text and an environment lookup.
    pub fn from_sources(
        content: Option<&str>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Config = match content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        if let Some(provider) = var(PROVIDER_VAR).filter(|p| !p.trim().is_empty()) {
            config.llm.provider = provider
                .parse()
                .with_context(|| format!("Invalid {}", PROVIDER_VAR))?;
        }

        config.telegram.bot_token = require(&var, BOT_TOKEN_VAR)?;
        config.llm.api_key = require(&var, config.llm.provider.api_key_var())?;

        debug!("Bot token length: {} characters", config.telegram.bot_token.len());
        debug!("API key length: {} characters", config.llm.api_key.len());

        Ok(config)
    }
}
