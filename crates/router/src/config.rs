//! Provider configuration.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::{Error, Result};

/// One `[[providers]]` entry, as written in the config file.
///
/// `api_key` may be an environment reference like `${OPENAI_API_KEY}`; it is
/// resolved when the backend is built, not here.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Wire protocol family: `openai`, `anthropic` or `ollama`.
    #[serde(rename = "type")]
    pub kind: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    /// Lower is preferred when a model is not listed anywhere.
    #[serde(default)]
    pub priority: i32,
    /// Anthropic only; defaults to 4096.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn kind(&self) -> Result<ProviderKind> {
        self.kind.parse()
    }
}

/// Supported backend protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAiCompatible,
    AnthropicCompatible,
    OllamaCompatible,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Self::OpenAiCompatible),
            "anthropic" => Ok(Self::AnthropicCompatible),
            "ollama" => Ok(Self::OllamaCompatible),
            other => Err(Error::Config(format!("unknown provider type: {other}"))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAiCompatible => write!(f, "openai"),
            Self::AnthropicCompatible => write!(f, "anthropic"),
            Self::OllamaCompatible => write!(f, "ollama"),
        }
    }
}
