//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The config file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `--args` was not a JSON value.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),

    /// An error from provider routing.
    #[error(transparent)]
    Router(#[from] router::Error),

    /// An error from a tool server.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
