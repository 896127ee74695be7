//! LLM provider routing.
//!
//! Requests name a model; the router picks the backend configured to serve
//! it and forwards the request in that provider's wire format. Three
//! protocol families are supported: OpenAI-compatible, Anthropic and Ollama.
//! Responses come back as the provider's raw JSON document.
//!
//! # Example
//!
//! ```no_run
//! use router::{Message, ModelRouter, ProviderConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> router::Result<()> {
//! let router = ModelRouter::new(&[ProviderConfig {
//!     name: "local".to_string(),
//!     kind: "ollama".to_string(),
//!     base_url: "http://localhost:11434".to_string(),
//!     api_key: None,
//!     models: vec!["llama2".to_string()],
//!     priority: 1,
//!     max_tokens: None,
//! }]);
//!
//! let cancel = CancellationToken::new();
//! let reply = router
//!     .chat_completion("llama2", &[Message::user("Hello!")], &cancel)
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod config;
mod error;
mod message;
mod router;

pub use backend::{
    AnthropicBackend, DEFAULT_MAX_TOKENS, LlmBackend, OllamaBackend, OpenAiBackend, build,
    resolve_credential,
};
pub use config::{ProviderConfig, ProviderKind};
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use router::{MODEL_PREFIX, ModelRouter, ProviderSummary};
