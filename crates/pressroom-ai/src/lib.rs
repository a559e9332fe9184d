//! Provider clients for the content pipeline: structured text
//! generation (with a priority fallback chain), web search, and
//! discovery/indexing submission.

pub mod chain;
pub mod error;
pub mod indexing;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod search;

pub use chain::ProviderChain;
pub use error::{AiError, SearchError};
pub use indexing::{IndexingClient, IndexingStatus};
pub use openai::OpenAiClient;
pub use provider::{GenerationRequest, TextGenerator};
pub use retry::retry_with_backoff;
pub use search::{SearchClient, SearchResult};
