//! Ollama backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Endpoint, LlmBackend};
use crate::{Message, ProviderConfig, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Backend for a local Ollama server. No credentials; streaming is always
/// turned off so the answer arrives as one document.
pub struct OllamaBackend {
    endpoint: Endpoint,
}

impl OllamaBackend {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
        }
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.endpoint.name)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
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
        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let request = self.endpoint.post("/api/chat").json(&body);
        self.endpoint.send(request, cancel).await
    }

    async fn completion(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let request = self.endpoint.post("/api/generate").json(&body);
        self.endpoint.send(request, cancel).await
    }
}
