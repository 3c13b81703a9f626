//! Reply providers for the honeypot engine
//!
//! This crate provides the provider abstraction, the concrete HTTP
//! transports, and the ordered fallback router built from configuration.

pub mod base;
pub mod botpress;
pub mod fallback;
pub mod openai;

pub use base::{
    FailureCause, Message, ProviderClient, ProviderError, ProviderReply, ProviderRequest,
    ProviderResult,
};
pub use botpress::BotpressClient;
pub use fallback::FallbackRouter;
pub use openai::OpenAiCompatClient;

use honeypot_core::config::ProvidersConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Per-call timeout from configuration, clamped to something usable
pub fn provider_timeout(config: &ProvidersConfig) -> Duration {
    if config.timeout_secs.is_finite() && config.timeout_secs > 0.0 {
        Duration::from_secs_f64(config.timeout_secs)
    } else {
        Duration::from_secs(6)
    }
}

/// Build the ordered provider chain. Entries without credentials are
/// skipped, which shortens the chain.
pub fn build_clients(config: &ProvidersConfig) -> Vec<Arc<dyn ProviderClient>> {
    let timeout = provider_timeout(config);
    let mut clients: Vec<Arc<dyn ProviderClient>> = Vec::new();

    for name in &config.chain {
        if name == "botpress" {
            if BotpressClient::is_configured(&config.botpress) {
                clients.push(Arc::new(BotpressClient::new(&config.botpress, timeout)));
            } else {
                info!("Skipping provider botpress: no token or bot id configured");
            }
            continue;
        }

        match config.compat(name) {
            Some(entry) if !entry.api_key.trim().is_empty() => {
                clients.push(Arc::new(OpenAiCompatClient::from_config(name, entry, timeout)));
            }
            Some(_) => info!("Skipping provider {}: no API key configured", name),
            None => info!("Skipping unknown provider {}", name),
        }
    }

    clients
}

/// Build the fallback router from configuration
pub fn build_router(config: &ProvidersConfig) -> FallbackRouter {
    let router = FallbackRouter::new(build_clients(config));
    info!("Provider chain: [{}]", router.names().join(" -> "));
    router
}
