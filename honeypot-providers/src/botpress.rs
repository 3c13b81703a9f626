//! Botpress Chat API client
//!
//! Botpress keeps its own conversation state, so each honeypot session is
//! mapped to one Botpress user and conversation. A call sends the newest
//! inbound text and polls until the bot posts an outgoing message.

use async_trait::async_trait;
use honeypot_core::config::BotpressConfig;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::base::{ProviderClient, ProviderError, ProviderReply, ProviderRequest, ProviderResult};

const PAYLOAD_TEXT_KEYS: &[&str] = &["text", "markdown", "message", "content", "body", "value"];

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedUser {
    user: IdOnly,
}

#[derive(Debug, Deserialize)]
struct CreatedConversation {
    conversation: IdOnly,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<BotMessage>,
}

#[derive(Debug, Deserialize)]
struct BotMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    direction: String,
    #[serde(default, rename = "createdAt")]
    created_at: String,
    #[serde(default)]
    payload: Value,
}

impl BotMessage {
    fn text(&self) -> Option<String> {
        let payload = self.payload.as_object()?;
        PAYLOAD_TEXT_KEYS.iter().find_map(|key| {
            payload
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
    }
}

/// Botpress-side identifiers for one honeypot session
#[derive(Debug, Clone, Default)]
struct Conversation {
    user_id: String,
    conversation_id: String,
    /// Outgoing bot messages already returned
    seen: HashSet<String>,
}

/// Client for the Botpress Chat API
pub struct BotpressClient {
    client: Client,
    api_base: String,
    token: String,
    bot_id: String,
    integration_alias: String,
    timeout: Duration,
    poll_interval: Duration,
    cooldown: Duration,
    conversations: Mutex<HashMap<String, Conversation>>,
    cooldown_until: Mutex<Option<Instant>>,
}

impl BotpressClient {
    pub fn new(config: &BotpressConfig, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            token: clean_token(&config.token),
            bot_id: config.bot_id.trim().to_string(),
            integration_alias: config.integration_alias.trim().to_string(),
            timeout,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
            cooldown: Duration::from_secs(config.cooldown_secs.max(1)),
            conversations: Mutex::new(HashMap::new()),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Whether both credentials are present
    pub fn is_configured(config: &BotpressConfig) -> bool {
        !clean_token(&config.token).is_empty() && !config.bot_id.trim().is_empty()
    }

    fn apply_headers(&self, mut req_builder: RequestBuilder) -> RequestBuilder {
        req_builder = req_builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("x-bot-id", &self.bot_id);
        if !self.integration_alias.is_empty() {
            req_builder = req_builder.header("x-integration-alias", &self.integration_alias);
        }
        req_builder
    }

    fn cooling_down(&self) -> bool {
        matches!(*self.cooldown_until.lock(), Some(until) if Instant::now() < until)
    }

    async fn send(&self, req_builder: RequestBuilder) -> ProviderResult<Response> {
        let response = self
            .apply_headers(req_builder)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            *self.cooldown_until.lock() = Some(Instant::now() + self.cooldown);
            warn!("Botpress rate limited; cooling down for {:?}", self.cooldown);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(self.name(), status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, req_builder: RequestBuilder) -> ProviderResult<T> {
        let response = self.send(req_builder).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.name(), e, self.timeout))?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::protocol(self.name(), format!("malformed JSON: {}", e)))
    }

    async fn ensure_conversation(&self, session_id: &str) -> ProviderResult<Conversation> {
        let existing = self.conversations.lock().get(session_id).cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let user: CreatedUser = self
            .send_json(
                self.client
                    .post(format!("{}/v1/chat/users", self.api_base))
                    .json(&json!({"name": "User", "tags": {}})),
            )
            .await?;
        if user.user.id.is_empty() {
            return Err(ProviderError::protocol(self.name(), "created user has no id"));
        }

        let conversation: CreatedConversation = self
            .send_json(
                self.client
                    .post(format!("{}/v1/chat/conversations", self.api_base))
                    .json(&json!({"channel": "api", "tags": {}})),
            )
            .await?;
        if conversation.conversation.id.is_empty() {
            return Err(ProviderError::protocol(
                self.name(),
                "created conversation has no id",
            ));
        }

        self.send(
            self.client
                .post(format!(
                    "{}/v1/chat/conversations/{}/participants",
                    self.api_base, conversation.conversation.id
                ))
                .json(&json!({"userId": user.user.id})),
        )
        .await?;

        let created = Conversation {
            user_id: user.user.id,
            conversation_id: conversation.conversation.id,
            seen: HashSet::new(),
        };
        debug!(
            "Mapped session {} to Botpress conversation {}",
            session_id, created.conversation_id
        );
        self.conversations
            .lock()
            .insert(session_id.to_string(), created.clone());
        Ok(created)
    }

    /// Poll until the bot posts something new or the deadline passes
    async fn poll_reply(
        &self,
        conversation: &Conversation,
        deadline: Instant,
    ) -> ProviderResult<(String, Vec<String>)> {
        loop {
            let list: MessageList = self
                .send_json(
                    self.client
                        .get(format!("{}/v1/chat/messages", self.api_base))
                        .query(&[("conversationId", conversation.conversation_id.as_str())]),
                )
                .await?;

            let mut fresh: Vec<BotMessage> = list
                .messages
                .into_iter()
                .filter(|m| m.direction == "outgoing")
                .filter(|m| !m.id.is_empty() && !conversation.seen.contains(&m.id))
                .collect();
            fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            let texts: Vec<String> = fresh.iter().filter_map(BotMessage::text).collect();
            if !texts.is_empty() {
                let ids = fresh.into_iter().map(|m| m.id).collect();
                return Ok((texts.join("\n"), ids));
            }

            if Instant::now() + self.poll_interval >= deadline {
                return Err(ProviderError::Timeout {
                    provider: self.name().to_string(),
                    after: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Drop the Botpress mapping for a session
    pub fn forget(&self, session_id: &str) {
        self.conversations.lock().remove(session_id);
    }
}

#[async_trait]
impl ProviderClient for BotpressClient {
    fn name(&self) -> &str {
        "botpress"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, request: &ProviderRequest) -> ProviderResult<ProviderReply> {
        if self.token.is_empty() || self.bot_id.is_empty() {
            return Err(ProviderError::auth(self.name(), "missing token or bot id"));
        }
        if self.cooling_down() {
            return Err(ProviderError::transport(
                self.name(),
                "cooling down after rate limit",
            ));
        }

        let deadline = Instant::now() + self.timeout;
        let text = request.latest_user_text().unwrap_or_default().to_string();
        let conversation = self.ensure_conversation(&request.session_id).await?;

        let sent = self
            .send(
                self.client
                    .post(format!("{}/v1/chat/messages", self.api_base))
                    .json(&json!({
                        "payload": {"type": "text", "text": text},
                        "userId": conversation.user_id,
                        "conversationId": conversation.conversation_id,
                        "type": "text",
                        "tags": {},
                    })),
            )
            .await;
        if let Err(err) = sent {
            if matches!(&err, ProviderError::Protocol { message, .. } if message.starts_with("HTTP 404")) {
                // conversation expired on the Botpress side; recreate next time
                self.forget(&request.session_id);
            }
            return Err(err);
        }

        let (reply, ids) = self.poll_reply(&conversation, deadline).await?;
        if let Some(entry) = self.conversations.lock().get_mut(&request.session_id) {
            entry.seen.extend(ids);
        }

        Ok(ProviderReply {
            text: reply,
            provider: self.name().to_string(),
        })
    }

    fn forget_session(&self, session_id: &str) {
        self.forget(session_id);
    }
}

/// Strip a `Bearer ` prefix and surrounding quotes from a pasted token
fn clean_token(raw: &str) -> String {
    let mut token = raw.trim();
    if let Some(prefix) = token.get(..7) {
        if prefix.eq_ignore_ascii_case("bearer ") {
            token = token[7..].trim();
        }
    }
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            token = token[1..token.len() - 1].trim();
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FailureCause;
    use honeypot_core::session::Turn;
    use mockito::{Matcher, Server, ServerGuard};

    fn config(base: String) -> BotpressConfig {
        BotpressConfig {
            token: "Bearer bp-token".to_string(),
            bot_id: "bot-1".to_string(),
            api_base: base,
            poll_interval_ms: 20,
            ..BotpressConfig::default()
        }
    }

    fn request(session: &str, text: &str) -> ProviderRequest {
        ProviderRequest::new(session, "ignored", vec![Turn::user(text)])
    }

    async fn mock_setup(server: &mut ServerGuard) -> mockito::Mock {
        let users = server
            .mock("POST", "/v1/chat/users")
            .match_header("authorization", "Bearer bp-token")
            .match_header("x-bot-id", "bot-1")
            .match_header("x-integration-alias", "chat")
            .with_status(200)
            .with_body(r#"{"user":{"id":"u-1"}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/chat/conversations")
            .with_status(200)
            .with_body(r#"{"conversation":{"id":"c-1"}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/chat/conversations/c-1/participants")
            .match_body(Matcher::PartialJson(json!({"userId": "u-1"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/v1/chat/messages")
            .match_body(Matcher::PartialJson(json!({
                "conversationId": "c-1",
                "payload": {"text": "hello?"}
            })))
            .with_status(200)
            .with_body(r#"{"message":{"id":"m-1"}}"#)
            .create_async()
            .await;
        users
    }

    #[test]
    fn test_clean_token() {
        assert_eq!(clean_token("  Bearer abc "), "abc");
        assert_eq!(clean_token("\"abc\""), "abc");
        assert_eq!(clean_token("abc"), "abc");
        assert_eq!(clean_token(""), "");
    }

    #[tokio::test]
    async fn test_generate_round_trip_and_reuse() {
        let mut server = Server::new_async().await;
        let users = mock_setup(&mut server).await;
        server
            .mock("GET", "/v1/chat/messages")
            .match_query(Matcher::UrlEncoded("conversationId".into(), "c-1".into()))
            .with_status(200)
            .with_body(
                r#"{"messages":[
                    {"id":"m-1","direction":"incoming","createdAt":"2026-01-01T00:00:00Z","payload":{"text":"hello?"}},
                    {"id":"b-2","direction":"outgoing","createdAt":"2026-01-01T00:00:02Z","payload":{"text":"are you there"}},
                    {"id":"b-1","direction":"outgoing","createdAt":"2026-01-01T00:00:01Z","payload":{"markdown":"hi"}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = BotpressClient::new(&config(server.url()), Duration::from_millis(400));
        let reply = client.generate(&request("s-1", "hello?")).await.unwrap();
        assert_eq!(reply.text, "hi\nare you there");
        assert_eq!(reply.provider, "botpress");

        // same session: no new user, and nothing unseen to return
        let err = client.generate(&request("s-1", "hello?")).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Timeout);
        users.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_starts_cooldown() {
        let mut server = Server::new_async().await;
        let users = server
            .mock("POST", "/v1/chat/users")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;

        let client = BotpressClient::new(&config(server.url()), Duration::from_secs(1));
        let err = client.generate(&request("s-1", "hello?")).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Transport);

        let err = client.generate(&request("s-1", "hello?")).await.unwrap_err();
        assert!(err.to_string().contains("cooling down"));
        users.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut cfg = config("http://127.0.0.1:9".to_string());
        cfg.bot_id = String::new();
        assert!(!BotpressClient::is_configured(&cfg));

        let client = BotpressClient::new(&cfg, Duration::from_secs(1));
        let err = client.generate(&request("s", "x")).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Auth);
    }

    #[test]
    fn test_forget_drops_mapping() {
        let client = BotpressClient::new(&BotpressConfig::default(), Duration::from_secs(1));
        client
            .conversations
            .lock()
            .insert("s".to_string(), Conversation::default());
        client.forget_session("s");
        assert!(client.conversations.lock().is_empty());
    }
}
