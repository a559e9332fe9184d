//! Text-generation provider abstraction.
//!
//! The pipeline depends only on this trait: "generate structured output
//! from a prompt" and "are you available". Concrete wire formats live in
//! the provider implementations; fallback order lives in
//! [`crate::chain::ProviderChain`].

use async_trait::async_trait;

use crate::error::AiError;

/// One structured-generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The site voice, injected as the system message.
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Trait every text-generation provider implements.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Cheap availability probe. Providers that cannot answer should
    /// return `false` rather than error; the chain skips them.
    async fn is_available(&self) -> bool;

    /// Generate a JSON object from the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] on transport failure, provider-level errors,
    /// or when the response body is not a JSON object.
    async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, AiError>;
}
