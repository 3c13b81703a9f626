//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session lifecycle and pacing
    #[serde(default)]
    pub session: SessionConfig,
    /// LLM provider chain
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Decoy wording
    #[serde(default)]
    pub persona: PersonaConfig,
    /// HTTP shell
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Counted exchanges before a session is ended automatically
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Number of most recent turns sent to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Minimum delay between two model calls for the same session
    #[serde(default = "default_min_call_delay")]
    pub min_call_delay_secs: f64,
    /// Sessions idle for this long are evicted by the sweeper
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// How often the sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Adopt unknown client-supplied ids instead of minting a new one
    #[serde(default)]
    pub adopt_client_ids: bool,
    /// Optional token in a model reply that ends the session
    #[serde(default)]
    pub end_marker: Option<String>,
    /// Lower bound of the random pause before an HTTP reply is sent
    #[serde(default = "default_reply_delay_min")]
    pub reply_delay_min_secs: f64,
    /// Upper bound of the random pause before an HTTP reply is sent
    #[serde(default = "default_reply_delay_max")]
    pub reply_delay_max_secs: f64,
}

fn default_max_turns() -> u32 {
    60
}

fn default_history_window() -> usize {
    12
}

fn default_min_call_delay() -> f64 {
    2.0
}

fn default_idle_timeout() -> u64 {
    1800
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_reply_delay_min() -> f64 {
    0.4
}

fn default_reply_delay_max() -> f64 {
    1.6
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_window: default_history_window(),
            min_call_delay_secs: default_min_call_delay(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            adopt_client_ids: false,
            end_marker: None,
            reply_delay_min_secs: default_reply_delay_min(),
            reply_delay_max_secs: default_reply_delay_max(),
        }
    }
}

/// Providers configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider names in the order they are attempted
    #[serde(default = "default_chain")]
    pub chain: Vec<String>,
    /// Per-call timeout applied to every provider
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default = "default_openai")]
    pub openai: ProviderConfig,
    #[serde(default = "default_groq")]
    pub groq: ProviderConfig,
    #[serde(default = "default_openrouter")]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub custom: ProviderConfig,
    #[serde(default)]
    pub botpress: BotpressConfig,
}

/// Provider names understood by the chain builder
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "groq", "openrouter", "custom", "botpress"];

fn default_chain() -> Vec<String> {
    vec!["openai".to_string(), "groq".to_string()]
}

fn default_timeout_secs() -> f64 {
    6.0
}

fn default_openai() -> ProviderConfig {
    ProviderConfig {
        model: "gpt-3.5-turbo".to_string(),
        ..ProviderConfig::default()
    }
}

fn default_groq() -> ProviderConfig {
    ProviderConfig {
        api_base: Some("https://api.groq.com/openai/v1".to_string()),
        model: "llama-3.1-8b-instant".to_string(),
        ..ProviderConfig::default()
    }
}

fn default_openrouter() -> ProviderConfig {
    ProviderConfig {
        api_base: Some("https://openrouter.ai/api/v1".to_string()),
        model: "openai/gpt-4o-mini".to_string(),
        ..ProviderConfig::default()
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            timeout_secs: default_timeout_secs(),
            openai: default_openai(),
            groq: default_groq(),
            openrouter: default_openrouter(),
            custom: ProviderConfig::default(),
            botpress: BotpressConfig::default(),
        }
    }
}

impl ProvidersConfig {
    /// Look up an OpenAI-compatible provider entry by name
    pub fn compat(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "openai" => Some(&self.openai),
            "groq" => Some(&self.groq),
            "openrouter" => Some(&self.openrouter),
            "custom" => Some(&self.custom),
            _ => None,
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Defaults to https://api.openai.com/v1 when unset
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}

fn default_max_tokens() -> u32 {
    120
}

fn default_temperature() -> f32 {
    0.8
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra_headers: None,
        }
    }
}

/// Botpress Chat API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotpressConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub bot_id: String,
    #[serde(default = "default_botpress_base")]
    pub api_base: String,
    #[serde(default = "default_integration_alias")]
    pub integration_alias: String,
    /// Delay between polls for the bot's reply
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Back-off applied after the API answers 429
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_botpress_base() -> String {
    "https://api.botpress.cloud".to_string()
}

fn default_integration_alias() -> String {
    "chat".to_string()
}

fn default_poll_interval_ms() -> u64 {
    400
}

fn default_cooldown_secs() -> u64 {
    30
}

impl Default for BotpressConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            bot_id: String::new(),
            api_base: default_botpress_base(),
            integration_alias: default_integration_alias(),
            poll_interval_ms: default_poll_interval_ms(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Wording used by the decoy outside of model output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Fixed system instruction sent with every provider call
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Reply returned once a session has ended
    #[serde(default = "default_closing_message")]
    pub closing_message: String,
    /// Canned replies used when no model reply is available
    #[serde(default = "default_stall_replies")]
    pub stall_replies: Vec<String>,
    /// Mask phone numbers, UPI handles and long digit runs in replies
    #[serde(default = "default_true")]
    pub redact_replies: bool,
}

fn default_system_prompt() -> String {
    "You are an ordinary person chatting over text messages. Reply briefly and naturally. \
     Never share passwords, PINs, one-time codes or other sensitive details."
        .to_string()
}

fn default_closing_message() -> String {
    "I'll check this directly with the bank.".to_string()
}

pub fn default_stall_replies() -> Vec<String> {
    [
        "One sec, I'm a bit busy right now.",
        "Sorry, can you say that again?",
        "Hmm okay, give me a minute.",
        "Wait, my phone is acting up.",
        "Can we be quick? I have to step out soon.",
        "Hold on, someone is at the door.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            closing_message: default_closing_message(),
            stall_replies: default_stall_replies(),
            redact_replies: true,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When set, requests must carry a matching `x-api-key` header
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}
