//! LLM backend abstraction.
//!
//! Each backend speaks one provider's wire protocol. Requests go out as a
//! single HTTP POST; whatever JSON comes back is returned as-is, since the
//! three protocol families have nothing in common worth normalizing.

mod anthropic;
mod credential;
mod ollama;
mod openai;

pub use anthropic::{AnthropicBackend, DEFAULT_MAX_TOKENS};
pub use credential::resolve_credential;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, ProviderKind};
use crate::{Error, Message, Result};

/// Trait for LLM backends.
///
/// Implementations translate the canonical request into their provider's
/// format, attach credentials and return the raw response document.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Configured provider name.
    fn name(&self) -> &str;

    /// Routing priority; lower is preferred.
    fn priority(&self) -> i32;

    /// Models this backend was configured to serve.
    fn list_models(&self) -> &[String];

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Value>;

    async fn completion(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Value>;
}

/// Build the backend matching `config.kind`.
pub fn build(config: &ProviderConfig) -> Result<Arc<dyn LlmBackend>> {
    let backend: Arc<dyn LlmBackend> = match config.kind()? {
        ProviderKind::OpenAiCompatible => Arc::new(OpenAiBackend::new(config)),
        ProviderKind::AnthropicCompatible => Arc::new(AnthropicBackend::new(config)),
        ProviderKind::OllamaCompatible => Arc::new(OllamaBackend::new(config)),
    };
    Ok(backend)
}

/// Connection details shared by every backend kind.
#[derive(Debug, Clone)]
struct Endpoint {
    name: String,
    base_url: String,
    models: Vec<String>,
    priority: i32,
    client: reqwest::Client,
}

impl Endpoint {
    fn new(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
            priority: config.priority,
            client: reqwest::Client::new(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header("accept", "application/json")
    }

    /// Send one request, giving up as soon as `cancel` fires.
    ///
    /// Dropping the in-flight future aborts the underlying connection.
    async fn send(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<Value> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|source| Error::ProviderUnreachable {
                    provider: self.name.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::ProviderTransport {
                    provider: self.name.clone(),
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|source| Error::ProviderUnreachable {
                    provider: self.name.clone(),
                    source,
                })?;

            serde_json::from_slice::<Value>(&body).map_err(|e| Error::InvalidResponse {
                provider: self.name.clone(),
                reason: e.to_string(),
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = exchange => result,
        }
    }
}
