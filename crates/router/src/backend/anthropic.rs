//! Anthropic API backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Endpoint, LlmBackend, resolve_credential};
use crate::{Message, ProviderConfig, Result, Role};

const ANTHROPIC_VERSION: &str = "2023-06-01";

static NO_CONTENT: Value = Value::String(String::new());

/// Used when the provider config does not set `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: &'a Value,
}

/// The API rejects a null `content`; absent and null become empty text.
fn content_of(message: &Message) -> &Value {
    match &message.content {
        None | Some(Value::Null) => &NO_CONTENT,
        Some(content) => content,
    }
}

/// Anthropic Messages API backend.
///
/// System messages are lifted out of the conversation into the top-level
/// `system` field, and `max_tokens` is always sent since the API requires it.
/// Text content goes out as a string; block arrays pass through unchanged.
pub struct AnthropicBackend {
    endpoint: Endpoint,
    api_key: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
            api_key: resolve_credential(config.api_key.as_deref()),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn build_request<'a>(&self, model: &'a str, messages: &'a [Message]) -> ApiRequest<'a> {
        // The API takes a single system prompt; the last one wins.
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(content_of)
            .next_back()
            .filter(|s| s.as_str() != Some(""));

        let messages = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: m.role,
                content: content_of(m),
            })
            .collect();

        ApiRequest {
            model,
            max_tokens: self.max_tokens,
            messages,
            system,
        }
    }
}

impl std::fmt::Display for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({})", self.endpoint.name)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn priority(&self) -> i32 {
        self.endpoint.priority
    }

    fn list_models(&self) -> &[String] {
        &self.endpoint.models
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let api_request = self.build_request(model, messages);

        let mut req = self
            .endpoint
            .post("/messages")
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&api_request);
        if !self.api_key.is_empty() {
            req = req.header("x-api-key", &self.api_key);
        }

        self.endpoint.send(req, cancel).await
    }

    async fn completion(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let messages = [Message::user(prompt)];
        self.chat_completion(model, &messages, cancel).await
    }
}
