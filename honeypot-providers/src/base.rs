//! Base trait for reply providers

use async_trait::async_trait;
use honeypot_core::session::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The call did not finish within its timeout
    Timeout,
    /// Network failure, rate limiting or a server-side error
    Transport,
    /// The provider answered with something that is not a usable reply
    Protocol,
    /// Credentials were rejected or the provider is misconfigured
    Auth,
}

impl FailureCause {
    /// Whether the next provider in the chain should be tried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureCause::Auth)
    }
}

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("{provider}: transport error: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider}: invalid response: {message}")]
    Protocol { provider: String, message: String },

    #[error("{provider}: authentication error: {message}")]
    Auth { provider: String, message: String },

    #[error("no providers configured")]
    NoProviders,
}

impl ProviderError {
    pub fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn protocol(provider: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn auth(provider: &str, message: impl Into<String>) -> Self {
        Self::Auth {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(provider: &str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                after: timeout,
            }
        } else if err.is_decode() {
            Self::protocol(provider, err.to_string())
        } else {
            Self::transport(provider, err.to_string())
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, honeypot_core::utils::truncate(body, 200));
        match status.as_u16() {
            401 | 403 => Self::auth(provider, message),
            408 | 429 => Self::transport(provider, message),
            code if code >= 500 => Self::transport(provider, message),
            _ => Self::protocol(provider, message),
        }
    }

    pub fn cause(&self) -> FailureCause {
        match self {
            ProviderError::Timeout { .. } => FailureCause::Timeout,
            ProviderError::Transport { .. } => FailureCause::Transport,
            ProviderError::Protocol { .. } => FailureCause::Protocol,
            ProviderError::Auth { .. } | ProviderError::NoProviders => FailureCause::Auth,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.cause().is_retryable()
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A chat message in the wire format shared by OpenAI-compatible APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::User => Message::user(turn.text.clone()),
            Role::Assistant => Message::assistant(turn.text.clone()),
        }
    }
}

/// Everything a provider needs for one reply. Built fresh for every call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub session_id: String,
    pub system: String,
    /// Recent turns, oldest first
    pub turns: Vec<Turn>,
}

impl ProviderRequest {
    pub fn new(session_id: impl Into<String>, system: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            session_id: session_id.into(),
            system: system.into(),
            turns,
        }
    }

    /// System instruction followed by the turns
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if !self.system.trim().is_empty() {
            messages.push(Message::system(self.system.clone()));
        }
        messages.extend(self.turns.iter().map(Message::from));
        messages
    }

    /// The newest turn from the remote party
    pub fn latest_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}

/// A generated reply
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    /// Name of the provider that produced it
    pub provider: String,
}

/// A backend able to produce a reply for a conversation
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Name used in logs and configuration
    fn name(&self) -> &str;

    /// Upper bound for one [`generate`](Self::generate) call
    fn timeout(&self) -> Duration;

    /// Produce a reply for the request
    async fn generate(&self, request: &ProviderRequest) -> ProviderResult<ProviderReply>;

    /// Release any per-session state held by the provider
    fn forget_session(&self, _session_id: &str) {}
}
