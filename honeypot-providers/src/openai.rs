//! OpenAI-compatible chat completions client
//!
//! Works with any endpoint that speaks the `/chat/completions` dialect:
//! OpenAI itself, Groq, OpenRouter or a self-hosted gateway.

use async_trait::async_trait;
use honeypot_core::config::ProviderConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::base::{
    Message, ProviderClient, ProviderError, ProviderReply, ProviderRequest, ProviderResult,
};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for one OpenAI-compatible endpoint
pub struct OpenAiCompatClient {
    name: String,
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    extra_headers: HashMap<String, String>,
}

impl OpenAiCompatClient {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        api_base: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let api_base = api_base
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            name: name.into(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 120,
            temperature: 0.8,
            timeout,
            extra_headers: HashMap::new(),
        }
    }

    /// Build from a configuration entry
    pub fn from_config(name: &str, config: &ProviderConfig, timeout: Duration) -> Self {
        let mut client = Self::new(
            name,
            config.api_key.clone(),
            config.api_base.clone(),
            config.model.clone(),
            timeout,
        );
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        client.extra_headers = config.extra_headers.clone().unwrap_or_default();
        client
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req_builder = req_builder.header("Authorization", format!("Bearer {}", self.api_key));
        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }
        req_builder
    }

    fn parse_body(&self, body: &str) -> ProviderResult<String> {
        let response: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::protocol(&self.name, format!("malformed JSON: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::protocol(&self.name, "no choices in response"))?;

        let text = choice.message.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::protocol(&self.name, "empty reply content"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, request: &ProviderRequest) -> ProviderResult<ProviderReply> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::auth(&self.name, "missing API key"));
        }

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: request.messages(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.api_base,
            self.model,
            body.messages.len()
        );

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .apply_headers(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&self.name, e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(&self.name, e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::from_status(&self.name, status, &text));
        }

        let reply = self.parse_body(&text)?;
        Ok(ProviderReply {
            text: reply,
            provider: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FailureCause;
    use honeypot_core::session::Turn;
    use mockito::{Matcher, Server};

    fn request() -> ProviderRequest {
        ProviderRequest::new("s-1", "stay calm", vec![Turn::user("hello")])
    }

    fn client(base: String) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            "openai",
            "sk-test",
            Some(base),
            "gpt-test",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_api_base_defaults_and_trims() {
        let c = OpenAiCompatClient::new("x", "k", None, "m", Duration::from_secs(1));
        assert_eq!(c.api_base(), DEFAULT_API_BASE);
        let c = OpenAiCompatClient::new(
            "x",
            "k",
            Some("http://host/v1/".to_string()),
            "m",
            Duration::from_secs(1),
        );
        assert_eq!(c.api_base(), "http://host/v1");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "stay calm"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  who is this? "}}]}"#)
            .create_async()
            .await;

        let reply = client(server.url()).generate(&request()).await.unwrap();
        assert_eq!(reply.text, "who is this?");
        assert_eq!(reply.provider, "openai");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":"bad key"}"#)
            .create_async()
            .await;

        let err = client(server.url()).generate(&request()).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Auth);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_transport() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(502)
            .create_async()
            .await;

        let err = client(server.url()).generate(&request()).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Transport);
    }

    #[tokio::test]
    async fn test_non_json_and_empty_replies_map_to_protocol() {
        let mut server = Server::new_async().await;
        let _html = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;
        let err = client(server.url()).generate(&request()).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Protocol);

        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"   "}}]}"#)
            .create_async()
            .await;
        let err = client(server.url()).generate(&request()).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Protocol);

        let mut server = Server::new_async().await;
        let _none = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;
        let err = client(server.url()).generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let c = OpenAiCompatClient::new(
            "groq",
            "",
            Some("http://127.0.0.1:9".to_string()),
            "m",
            Duration::from_secs(1),
        );
        let err = c.generate(&request()).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Auth);
    }

    #[test]
    fn test_from_config_copies_sampling() {
        let mut config = ProviderConfig::default();
        config.api_key = "k".to_string();
        config.model = "m".to_string();
        config.max_tokens = 64;
        config.temperature = 0.3;
        let c = OpenAiCompatClient::from_config("custom", &config, Duration::from_secs(2));
        assert_eq!(c.max_tokens, 64);
        assert!((c.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(c.timeout(), Duration::from_secs(2));
        assert_eq!(c.name(), "custom");
    }
}
