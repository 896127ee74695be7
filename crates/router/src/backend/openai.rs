//! OpenAI-compatible backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Endpoint, LlmBackend, resolve_credential};
use crate::{Message, ProviderConfig, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Backend for the OpenAI API and servers that mimic it.
///
/// Messages are forwarded verbatim; auth is a bearer token.
pub struct OpenAiBackend {
    endpoint: Endpoint,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
            api_key: resolve_credential(config.api_key.as_deref()),
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut request = self.endpoint.post(path).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        self.endpoint.send(request, cancel).await
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({})", self.endpoint.name)
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
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
        let body = ChatRequest { model, messages };
        self.post("/chat/completions", &body, cancel).await
    }

    async fn completion(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let body = CompletionRequest { model, prompt };
        self.post("/completions", &body, cancel).await
    }
}
