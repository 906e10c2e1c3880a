//! Model-service seam: request types, the error taxonomy the retry loop keys
//! on, and a blocking Messages API client driven from the tokio blocking pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::ModelConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

impl ModelRequest {
    /// Single user-turn request.
    pub fn single(model: impl Into<String>, max_tokens: u32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: vec![ChatMessage::user(prompt)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("missing API credential: set {0}")]
    MissingCredential(String),
    #[error("rate_limit ({status}): {message}")]
    RateLimited { status: u16, message: String },
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Transient backpressure that is worth retrying.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } => true,
            ModelError::Api { message, .. } | ModelError::Transport(message) => mentions_rate_limit(message),
            ModelError::MissingCredential(_) | ModelError::InvalidResponse(_) => false,
        }
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate_limit") || lower.contains("rate limit")
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Issue one request and return the generated text.
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError>;
}

/// Messages API client. `ureq` is blocking, so each call hops onto the blocking
/// pool.
#[derive(Clone)]
pub struct AnthropicClient {
    agent: ureq::Agent,
    api_url: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl AnthropicClient {
    /// `request_timeout` bounds the whole call; `None` leaves it unbounded once
    /// connected.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new().timeout_connect(connect_timeout);
        if let Some(t) = request_timeout {
            builder = builder.timeout(t);
        }
        let agent = builder.build();
        Self {
            agent,
            api_url: api_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }

    /// Credential is read from the configured environment variable. A missing
    /// key is not an error here; each call reports it instead.
    pub fn from_config(cfg: &ModelConfig) -> Self {
        let key = std::env::var(&cfg.api_key_env).ok();
        let mut client = Self::new(&cfg.api_url, key, cfg.connect_timeout(), cfg.request_timeout());
        client.api_key_env = cfg.api_key_env.clone();
        client
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError> {
        let Some(key) = self.api_key.clone() else {
            return Err(ModelError::MissingCredential(self.api_key_env.clone()));
        };
        let agent = self.agent.clone();
        let url = self.api_url.clone();
        tracing::debug!(model = %request.model, max_tokens = request.max_tokens, "model request");

        tokio::task::spawn_blocking(move || post_messages(&agent, &url, &key, &request))
            .await
            .map_err(|e| ModelError::Transport(format!("request task failed: {e}")))?
    }
}

fn post_messages(agent: &ureq::Agent, url: &str, key: &str, request: &ModelRequest) -> Result<String, ModelError> {
    let resp = agent
        .post(url)
        .set("x-api-key", key)
        .set("anthropic-version", ANTHROPIC_VERSION)
        .set("content-type", "application/json")
        .send_json(request);

    match resp {
        Ok(r) => {
            let body: Value = r
                .into_json()
                .map_err(|e| ModelError::InvalidResponse(format!("body is not JSON: {e}")))?;
            extract_text(&body)
        }
        Err(ureq::Error::Status(status, r)) => {
            let body = r.into_string().unwrap_or_default();
            Err(classify_status(status, &body))
        }
        Err(ureq::Error::Transport(t)) => Err(ModelError::Transport(t.to_string())),
    }
}

/// Concatenated text blocks of a Messages API response.
pub fn extract_text(body: &Value) -> Result<String, ModelError> {
    let blocks = body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ModelError::InvalidResponse("missing content array".to_string()))?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        return Err(ModelError::InvalidResponse("no text content".to_string()));
    }
    Ok(text)
}

/// Map an HTTP error status and its body onto the error taxonomy.
pub fn classify_status(status: u16, body: &str) -> ModelError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let kind = error.and_then(|e| e.get("type")).and_then(|t| t.as_str()).unwrap_or("");
    let detail = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    let message = if kind.is_empty() { detail } else { format!("{kind}: {detail}") };

    if status == 429 || kind == "rate_limit_error" {
        ModelError::RateLimited { status, message }
    } else {
        ModelError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new(format!("{}/v1/messages", server.uri()), Some("sk-test".into()), Duration::from_secs(5), None)
    }

    #[test]
    fn status_classification() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#;
        let e = classify_status(429, body);
        assert_eq!(e, ModelError::RateLimited { status: 429, message: "rate_limit_error: slow down".into() });
        assert!(e.is_rate_limit());

        let e = classify_status(401, r#"{"error":{"type":"authentication_error","message":"bad key"}}"#);
        assert!(!e.is_rate_limit());
        assert_eq!(e.to_string(), "API error (401): authentication_error: bad key");

        assert!(classify_status(500, "upstream rate limit hit").is_rate_limit());
        assert!(!ModelError::MissingCredential("ANTHROPIC_API_KEY".into()).is_rate_limit());
    }

    #[test]
    fn text_blocks_are_joined() {
        let body = json!({ "content": [
            { "type": "text", "text": "Hello " },
            { "type": "tool_use", "id": "x" },
            { "type": "text", "text": "world" }
        ]});
        assert_eq!(extract_text(&body).unwrap(), "Hello world");
        assert!(extract_text(&json!({ "content": [] })).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn posts_messages_and_reads_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "text", "text": "Conversions look fine." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = client(&server)
            .complete(ModelRequest::single("claude-test", 300, "hi"))
            .await
            .unwrap();
        assert_eq!(out, "Conversions look fine.");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "type": "error",
                "error": { "type": "rate_limit_error", "message": "Number of requests exceeded" }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(ModelRequest::single("claude-test", 300, "hi"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limit(), "{err}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_reply_is_not_cut_off_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "content": [{ "type": "text", "text": "long answer" }] }))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let c = AnthropicClient::new(format!("{}/v1/messages", server.uri()), Some("sk-test".into()), Duration::from_secs(1), None);
        let out = c.complete(ModelRequest::single("claude-test", 4000, "hi")).await.unwrap();
        assert_eq!(out, "long answer");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let c = AnthropicClient::new("http://127.0.0.1:9/v1/messages", None, Duration::from_secs(1), None);
        let err = c.complete(ModelRequest::single("m", 10, "hi")).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential(_)));
    }
}
