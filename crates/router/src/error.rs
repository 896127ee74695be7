use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("provider {provider} returned {status}: {body}")]
    ProviderTransport {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("provider {provider} unreachable: {source}")]
    ProviderUnreachable {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("no provider available for model: {0}")]
    NoAdapter(String),

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
