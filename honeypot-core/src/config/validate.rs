//! Configuration validation rules.

use super::schema::{Config, KNOWN_PROVIDERS};
use std::collections::HashSet;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let session = &config.session;
    if session.max_turns == 0 {
        errors.push("session.max_turns must be > 0".to_string());
    }
    if session.history_window == 0 {
        errors.push("session.history_window must be > 0".to_string());
    }
    if !session.min_call_delay_secs.is_finite() || session.min_call_delay_secs < 0.0 {
        errors.push("session.min_call_delay_secs must be >= 0".to_string());
    }
    let delays = [session.reply_delay_min_secs, session.reply_delay_max_secs];
    if delays.iter().any(|d| !d.is_finite() || *d < 0.0) {
        errors.push("session.reply_delay_min_secs/reply_delay_max_secs must be >= 0".to_string());
    } else if session.reply_delay_min_secs > session.reply_delay_max_secs {
        errors.push("session.reply_delay_min_secs must not exceed reply_delay_max_secs".to_string());
    }
    if session.idle_timeout_secs == 0 {
        errors.push("session.idle_timeout_secs must be > 0".to_string());
    }
    if session.sweep_interval_secs == 0 {
        errors.push("session.sweep_interval_secs must be > 0".to_string());
    }
    if matches!(&session.end_marker, Some(marker) if marker.trim().is_empty()) {
        errors.push("session.end_marker must not be blank when set".to_string());
    }

    let providers = &config.providers;
    if !providers.timeout_secs.is_finite() || providers.timeout_secs <= 0.0 {
        errors.push("providers.timeout_secs must be > 0".to_string());
    }
    let mut seen = HashSet::new();
    for name in &providers.chain {
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            errors.push(format!(
                "providers.chain contains unknown provider '{}' (expected one of {})",
                name,
                KNOWN_PROVIDERS.join(", ")
            ));
        }
        if !seen.insert(name.as_str()) {
            errors.push(format!("providers.chain lists '{}' more than once", name));
        }
    }
    for name in ["openai", "groq", "openrouter", "custom"] {
        if let Some(entry) = providers.compat(name) {
            if !(0.0..=2.0).contains(&entry.temperature) {
                errors.push(format!(
                    "providers.{}.temperature must be in [0.0, 2.0]",
                    name
                ));
            }
            if entry.max_tokens == 0 {
                errors.push(format!("providers.{}.max_tokens must be > 0", name));
            }
        }
    }

    let persona = &config.persona;
    if persona.closing_message.trim().is_empty() {
        errors.push("persona.closing_message must not be empty".to_string());
    }
    if persona.stall_replies.iter().all(|s| s.trim().is_empty()) {
        errors.push("persona.stall_replies must contain at least one line".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
