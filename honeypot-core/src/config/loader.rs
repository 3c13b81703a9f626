//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const PATH_PREFIX: &str = "HONEYPOT__";

/// How an alias variable's raw value is turned into JSON
#[derive(Clone, Copy)]
enum AliasKind {
    /// Credentials and names stay strings even when they look numeric
    Text,
    /// Numbers and flags go through the same parsing as path overrides
    Parsed,
}

const ALIASES: &[(&str, &str, AliasKind)] = &[
    ("OPENAI_API_KEY", "providers.openai.api_key", AliasKind::Text),
    ("OPENAI_MODEL", "providers.openai.model", AliasKind::Text),
    ("GROQ_API_KEY", "providers.groq.api_key", AliasKind::Text),
    ("OPENROUTER_API_KEY", "providers.openrouter.api_key", AliasKind::Text),
    ("BOTPRESS_TOKEN", "providers.botpress.token", AliasKind::Text),
    ("BOTPRESS_BOT_ID", "providers.botpress.bot_id", AliasKind::Text),
    ("LLM_TIMEOUT", "providers.timeout_secs", AliasKind::Parsed),
    ("MAX_TURNS", "session.max_turns", AliasKind::Parsed),
    ("DELAY_MIN", "session.reply_delay_min_secs", AliasKind::Parsed),
    ("DELAY_MAX", "session.reply_delay_max_secs", AliasKind::Parsed),
    ("HONEYPOT_API_KEY", "server.api_key", AliasKind::Text),
    ("PORT", "server.port", AliasKind::Parsed),
    ("LOG_LEVEL", "logging.level", AliasKind::Text),
];

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".honeypot"))
            .unwrap_or_else(|| PathBuf::from(".honeypot"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration: defaults, then `config.json`, then alias
    /// variables, then `HONEYPOT__SECTION__KEY` variables.
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content).map_err(|e| {
                crate::Error::Config(format!("{}: {}", config_path.display(), e))
            })?;
            merge_values(&mut merged, file_value);
        }

        apply_alias_overrides(&mut merged);
        apply_path_overrides(&mut merged);

        let config: Config = serde_json::from_value(merged)
            .map_err(|e| crate::Error::Config(format!("invalid setting: {}", e)))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

fn apply_alias_overrides(config: &mut Value) {
    for (env_key, target_path, kind) in ALIASES {
        let Ok(raw) = std::env::var(env_key) else {
            continue;
        };
        if raw.trim().is_empty() {
            continue;
        }
        let value = match kind {
            AliasKind::Text => Value::String(raw),
            AliasKind::Parsed => parse_env_value(raw.trim()),
        };
        let path: Vec<String> = target_path.split('.').map(ToString::to_string).collect();
        set_path_value(config, &path, value);
    }
}

fn apply_path_overrides(config: &mut Value) {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(PATH_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        set_path_value(config, &segments, parse_env_value(&value));
    }
}
