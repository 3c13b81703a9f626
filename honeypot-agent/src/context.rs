//! Context builder for assembling provider requests

use honeypot_core::session::Session;
use honeypot_providers::ProviderRequest;

/// Builds the context for provider calls
pub struct ContextBuilder {
    system_prompt: String,
}

impl ContextBuilder {
    /// Create a new context builder around a fixed system instruction
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Request for the session's current window. The newest inbound turn
    /// must already be in the history.
    pub fn build_request(&self, session: &Session) -> ProviderRequest {
        ProviderRequest::new(
            session.id.clone(),
            self.system_prompt.clone(),
            session.history.window().to_vec(),
        )
    }
}
