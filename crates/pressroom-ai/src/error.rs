//! Error types for provider, search, and indexing clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),
    #[error("provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("provider returned an error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("provider '{0}' is not available")]
    Unavailable(String),
    #[error("all providers in the chain failed; last error: {0}")]
    AllProvidersFailed(String),
    #[error("failed to parse structured output from {context}")]
    Deserialize {
        context: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no search API key configured")]
    MissingApiKey,
    #[error("search API returned an error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse search response")]
    Deserialize(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
