//! Discovery/indexing submission client.
//!
//! Fire a published URL at the configured endpoint and report whether it
//! was accepted. Callers treat the whole operation as best-effort.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::SearchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingStatus {
    Accepted,
    Rejected(String),
}

pub struct IndexingClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    #[serde(default)]
    accepted: bool,
    #[serde(default)]
    reason: Option<String>,
}

impl IndexingClient {
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pressroom/0.1 (content-pipeline)")
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Submits `url` for discovery.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Api`] on non-2xx responses or
    /// [`SearchError::Http`] on transport failure.
    pub async fn submit(&self, url: &str) -> Result<IndexingStatus, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "url": url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: IndexingResponse = response.json().await?;
        if body.accepted {
            Ok(IndexingStatus::Accepted)
        } else {
            Ok(IndexingStatus::Rejected(
                body.reason.unwrap_or_else(|| "unspecified".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn submit_reports_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
            .mount(&server)
            .await;

        let client = IndexingClient::new(&format!("{}/index", server.uri()), 10).unwrap();
        let status = client.submit("https://example.com/article").await.unwrap();
        assert_eq!(status, IndexingStatus::Accepted);
    }

    #[tokio::test]
    async fn submit_reports_rejection_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accepted": false, "reason": "duplicate"
            })))
            .mount(&server)
            .await;

        let client = IndexingClient::new(&format!("{}/index", server.uri()), 10).unwrap();
        let status = client.submit("https://example.com/article").await.unwrap();
        assert_eq!(status, IndexingStatus::Rejected("duplicate".to_string()));
    }
}
