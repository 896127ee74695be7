//! Model-name routing across configured backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{self, LlmBackend};
use crate::{Error, Message, ProviderConfig, Result};

/// Clients may namespace model names with this prefix; it is stripped before
/// lookup.
pub const MODEL_PREFIX: &str = "switchboard-";

/// What `providers()` reports for each backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub name: String,
    pub priority: i32,
    pub models: Vec<String>,
}

/// Routes requests to the backend serving the requested model.
///
/// The index maps each configured model to the first backend that listed it.
/// Names missing from the index go to the backend with the lowest priority
/// value.
pub struct ModelRouter {
    /// Sorted by ascending priority; ties keep configuration order.
    backends: Vec<Arc<dyn LlmBackend>>,
    index: HashMap<String, Arc<dyn LlmBackend>>,
    /// Indexed model names in registration order.
    models: Vec<String>,
}

impl ModelRouter {
    /// Build backends from configuration. Providers that fail to build are
    /// logged and left out.
    pub fn new(configs: &[ProviderConfig]) -> Self {
        let backends = configs
            .iter()
            .filter_map(|config| match backend::build(config) {
                Ok(backend) => Some(backend),
                Err(e) => {
                    warn!(provider = %config.name, error = %e, "skipping provider");
                    None
                }
            })
            .collect();
        Self::from_backends(backends)
    }

    /// Build a router from ready-made backends, in configuration order.
    pub fn from_backends(backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        let mut index: HashMap<String, Arc<dyn LlmBackend>> = HashMap::new();
        let mut models = Vec::new();

        for backend in &backends {
            for model in backend.list_models() {
                if let Some(owner) = index.get(model) {
                    debug!(
                        model = %model,
                        owner = %owner.name(),
                        provider = %backend.name(),
                        "model already registered"
                    );
                    continue;
                }
                index.insert(model.clone(), Arc::clone(backend));
                models.push(model.clone());
            }
        }

        let mut backends = backends;
        backends.sort_by_key(|b| b.priority());

        info!(
            providers = backends.len(),
            models = models.len(),
            "model router ready"
        );

        Self {
            backends,
            index,
            models,
        }
    }

    /// Resolve the backend for `model`.
    pub fn get_adapter(&self, model: &str) -> Result<Arc<dyn LlmBackend>> {
        if let Some(backend) = self.index.get(model) {
            return Ok(Arc::clone(backend));
        }

        match self.backends.first() {
            Some(fallback) => {
                debug!(model, provider = %fallback.name(), "no exact match, using fallback");
                Ok(Arc::clone(fallback))
            }
            None => Err(Error::NoAdapter(model.to_string())),
        }
    }

    pub async fn chat_completion(
        &self,
        model: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let model = normalize_model(model);
        let backend = self.get_adapter(model)?;
        debug!(model, provider = %backend.name(), "routing chat completion");

        let started = Instant::now();
        let result = backend.chat_completion(model, messages, cancel).await;
        log_request("chat_completion", model, backend.name(), started, &result);
        result
    }

    pub async fn completion(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let model = normalize_model(model);
        let backend = self.get_adapter(model)?;
        debug!(model, provider = %backend.name(), "routing completion");

        let started = Instant::now();
        let result = backend.completion(model, prompt, cancel).await;
        log_request("completion", model, backend.name(), started, &result);
        result
    }

    /// Every routable model name, each once, in registration order.
    pub fn list_models(&self) -> &[String] {
        &self.models
    }

    /// Backends in fallback order.
    pub fn providers(&self) -> Vec<ProviderSummary> {
        self.backends
            .iter()
            .map(|b| ProviderSummary {
                name: b.name().to_string(),
                priority: b.priority(),
                models: b.list_models().to_vec(),
            })
            .collect()
    }
}

fn normalize_model(model: &str) -> &str {
    model.strip_prefix(MODEL_PREFIX).unwrap_or(model)
}

/// One record per dispatched request.
fn log_request(
    method: &'static str,
    model: &str,
    provider: &str,
    started: Instant,
    result: &Result<Value>,
) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match result {
        Ok(_) => info!(
            model,
            provider,
            method,
            duration_ms,
            success = true,
            "request completed"
        ),
        Err(e) => warn!(
            model,
            provider,
            method,
            duration_ms,
            success = false,
            error = %e,
            "request failed"
        ),
    }
}
