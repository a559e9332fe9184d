//! OpenAI-compatible chat-completions client.
//!
//! Works against the hosted API and any compatible local endpoint; the
//! base URL is injectable so tests can point at a wiremock server. The
//! model is asked for a JSON object (`response_format`), and the reply
//! content is parsed with a tolerance for markdown code fences.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AiError;
use crate::provider::{GenerationRequest, TextGenerator};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiClient {
    /// Creates a client pointed at the hosted API.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (compatible local
    /// endpoints, or wiremock in tests).
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pressroom/0.1 (content-pipeline)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Strip a surrounding markdown code fence, if present.
///
/// Some models wrap JSON-mode output in ```json fences despite the
/// response format; the payload inside is still what we asked for.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.authorize(self.client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<Value, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AiError::MissingApiKey(self.name().to_string()));
        }
        if status.as_u16() == 429 {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::RateLimited(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ChatResponse = response.json().await?;
        let content = envelope
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let value: Value = serde_json::from_str(strip_code_fence(content)).map_err(|e| {
            AiError::Deserialize {
                context: format!("chat completion (model={})", self.model),
                source: e,
            }
        })?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_body(content: &str) -> Value {
        json!({
            "choices": [ { "message": { "role": "assistant", "content": content } } ]
        })
    }

    #[test]
    fn strip_code_fence_passthrough() {
        assert_eq!(strip_code_fence(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn strip_code_fence_removes_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_removes_plain_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn generate_structured_parses_json_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body(r#"{"title": "Hello"}"#)),
            )
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        let request = GenerationRequest::new("system", "prompt");
        let value = client.generate_structured(&request).await.unwrap();
        assert_eq!(value["title"], "Hello");
    }

    #[tokio::test]
    async fn generate_structured_tolerates_fenced_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("```json\n{\"title\": \"Fenced\"}\n```")),
            )
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        let request = GenerationRequest::new("system", "prompt");
        let value = client.generate_structured(&request).await.unwrap();
        assert_eq!(value["title"], "Fenced");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_missing_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(None, "test-model", 10, &server.uri()).unwrap();
        let request = GenerationRequest::new("system", "prompt");
        let err = client.generate_structured(&request).await.unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        let request = GenerationRequest::new("system", "prompt");
        let err = client.generate_structured(&request).await.unwrap_err();
        assert!(matches!(err, AiError::RateLimited(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn non_json_content_maps_to_deserialize() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("not json at all")))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        let request = GenerationRequest::new("system", "prompt");
        let err = client.generate_structured(&request).await.unwrap_err();
        assert!(matches!(err, AiError::Deserialize { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn is_available_true_when_models_endpoint_responds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        assert!(client.is_available().await);
    }

    #[tokio::test]
    async fn is_available_false_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::with_base_url(Some("key".into()), "test-model", 10, &server.uri())
                .unwrap();
        assert!(!client.is_available().await);
    }
}
