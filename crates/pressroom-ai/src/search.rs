//! Web-search client for enhancement research.
//!
//! Brave-style API: query in, titled snippets out. The enhancement
//! runner treats every failure here as degradable: a missing key or a
//! dead endpoint becomes a placeholder, never a phase failure.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;

use crate::error::SearchError;

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct SearchClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

impl SearchClient {
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Result<Self, SearchError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        api_key: Option<String>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pressroom/0.1 (content-pipeline)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Searches the web for `query`, returning up to `count` results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingApiKey`] when no key is configured,
    /// [`SearchError::Api`] on non-2xx responses, or
    /// [`SearchError::Http`] on transport failure.
    pub async fn search(&self, query: &str, count: u8) -> Result<Vec<SearchResult>, SearchError> {
        let Some(api_key) = &self.api_key else {
            return Err(SearchError::MissingApiKey);
        };

        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        let url = format!(
            "{}/web/search?q={}&count={}",
            self.base_url, encoded, count
        );

        let response = self
            .client
            .get(&url)
            .header("X-Subscription-Token", api_key)
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

        let body: SearchResponse = response.json().await?;
        let results = body
            .web
            .map(|w| {
                w.results
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.url,
                        snippet: r.description,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": { "results": [
                    { "title": "A", "url": "https://a.example", "description": "first" },
                    { "title": "B", "url": "https://b.example", "description": "second" },
                ]}
            })))
            .mount(&server)
            .await;

        let client =
            SearchClient::with_base_url(Some("key".into()), 10, &server.uri()).unwrap();
        let results = client.search("quiet beach towns", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "A");
        assert_eq!(results[1].snippet, "second");
    }

    #[tokio::test]
    async fn search_without_key_fails_fast() {
        let client = SearchClient::with_base_url(None, 10, "http://127.0.0.1:1").unwrap();
        let err = client.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::MissingApiKey), "got: {err:?}");
    }

    #[tokio::test]
    async fn search_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web/search"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad query"))
            .mount(&server)
            .await;

        let client =
            SearchClient::with_base_url(Some("key".into()), 10, &server.uri()).unwrap();
        let err = client.search("q", 5).await.unwrap_err();
        assert!(
            matches!(err, SearchError::Api { status: 422, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn search_with_empty_web_section_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client =
            SearchClient::with_base_url(Some("key".into()), 10, &server.uri()).unwrap();
        let results = client.search("q", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
