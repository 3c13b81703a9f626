//! Ordered fallback across reply providers

use std::sync::Arc;
use tracing::{info, warn};

use crate::base::{ProviderClient, ProviderError, ProviderReply, ProviderRequest, ProviderResult};

/// Tries providers in a fixed order, one attempt each, for one logical call.
///
/// Timeouts, transport errors and unusable payloads move on to the next
/// provider. An authentication failure ends the chain immediately.
pub struct FallbackRouter {
    clients: Vec<Arc<dyn ProviderClient>>,
}

impl FallbackRouter {
    pub fn new(clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self { clients }
    }

    /// Provider names in attempt order
    pub fn names(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub async fn generate(&self, request: &ProviderRequest) -> ProviderResult<ProviderReply> {
        let mut last_error = None;

        for (index, client) in self.clients.iter().enumerate() {
            let limit = client.timeout();
            let outcome = match tokio::time::timeout(limit, client.generate(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: client.name().to_string(),
                    after: limit,
                }),
            };

            match outcome {
                Ok(reply) => {
                    if index > 0 {
                        info!(
                            session_id = %request.session_id,
                            provider = %client.name(),
                            "fallback provider answered"
                        );
                    }
                    return Ok(reply);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        session_id = %request.session_id,
                        provider = %client.name(),
                        cause = ?err.cause(),
                        "provider failed, trying next: {}",
                        err
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    warn!(
                        session_id = %request.session_id,
                        provider = %client.name(),
                        "provider rejected credentials, stopping chain: {}",
                        err
                    );
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NoProviders))
    }

    /// Let every provider drop state it keeps for `session_id`
    pub fn forget_session(&self, session_id: &str) {
        for client in &self.clients {
            client.forget_session(session_id);
        }
    }
}
