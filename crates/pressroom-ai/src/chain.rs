//! Priority fallback chain over text-generation providers.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AiError;
use crate::provider::{GenerationRequest, TextGenerator};
use crate::retry::retry_with_backoff;

/// A fixed-priority list of providers, tried in order.
///
/// Unavailable providers are skipped; the first successful generation
/// wins. Each provider gets the chain's retry budget for transient
/// errors before the chain falls through to the next one. The chain
/// itself implements [`TextGenerator`], so callers never know whether
/// they are talking to one provider or five.
pub struct ProviderChain {
    providers: Vec<Box<dyn TextGenerator>>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ProviderChain {
    /// A chain that fails over between providers but never retries a
    /// provider in place.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn TextGenerator>>) -> Self {
        Self::with_retry(providers, 0, 0)
    }

    /// A chain that retries each provider up to `max_retries` times on
    /// transient errors, backing off from `backoff_base_ms`, before
    /// moving on to the next provider.
    #[must_use]
    pub fn with_retry(
        providers: Vec<Box<dyn TextGenerator>>,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            providers,
            max_retries,
            backoff_base_ms,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl TextGenerator for ProviderChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn is_available(&self) -> bool {
        for provider in &self.providers {
            if provider.is_available().await {
                return true;
            }
        }
        false
    }

    async fn generate_structured(&self, request: &GenerationRequest) -> Result<Value, AiError> {
        let mut last_error: Option<AiError> = None;

        for provider in &self.providers {
            if !provider.is_available().await {
                tracing::debug!(provider = provider.name(), "provider unavailable, skipping");
                continue;
            }
            let attempt = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                provider.generate_structured(request)
            })
            .await;
            match attempt {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "provider failed, falling through to next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => AiError::AllProvidersFailed(e.to_string()),
            None => AiError::Unavailable("chain".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Scripted {
        name: &'static str,
        available: bool,
        result: Result<Value, &'static str>,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn generate_structured(
            &self,
            _request: &GenerationRequest,
        ) -> Result<Value, AiError> {
            self.result
                .clone()
                .map_err(|m| AiError::Api {
                    status: 500,
                    message: m.to_string(),
                })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("system", "prompt")
    }

    #[tokio::test]
    async fn first_available_provider_wins() {
        let chain = ProviderChain::new(vec![
            Box::new(Scripted {
                name: "a",
                available: true,
                result: Ok(json!({"from": "a"})),
            }),
            Box::new(Scripted {
                name: "b",
                available: true,
                result: Ok(json!({"from": "b"})),
            }),
        ]);
        let value = chain.generate_structured(&request()).await.unwrap();
        assert_eq!(value["from"], "a");
    }

    #[tokio::test]
    async fn unavailable_provider_is_skipped() {
        let chain = ProviderChain::new(vec![
            Box::new(Scripted {
                name: "a",
                available: false,
                result: Ok(json!({"from": "a"})),
            }),
            Box::new(Scripted {
                name: "b",
                available: true,
                result: Ok(json!({"from": "b"})),
            }),
        ]);
        let value = chain.generate_structured(&request()).await.unwrap();
        assert_eq!(value["from"], "b");
    }

    #[tokio::test]
    async fn failing_provider_falls_through() {
        let chain = ProviderChain::new(vec![
            Box::new(Scripted {
                name: "a",
                available: true,
                result: Err("boom"),
            }),
            Box::new(Scripted {
                name: "b",
                available: true,
                result: Ok(json!({"from": "b"})),
            }),
        ]);
        let value = chain.generate_structured(&request()).await.unwrap();
        assert_eq!(value["from"], "b");
    }

    #[tokio::test]
    async fn all_failures_surface_last_error() {
        let chain = ProviderChain::new(vec![
            Box::new(Scripted {
                name: "a",
                available: true,
                result: Err("first"),
            }),
            Box::new(Scripted {
                name: "b",
                available: true,
                result: Err("second"),
            }),
        ]);
        let err = chain.generate_structured(&request()).await.unwrap_err();
        match err {
            AiError::AllProvidersFailed(msg) => assert!(msg.contains("second")),
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    struct Flaky {
        calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
        failures: u32,
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_structured(
            &self,
            _request: &GenerationRequest,
        ) -> Result<Value, AiError> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            if call <= self.failures {
                Err(AiError::RateLimited("throttled".to_string()))
            } else {
                Ok(json!({"from": "flaky"}))
            }
        }
    }

    #[tokio::test]
    async fn with_retry_recovers_a_transient_provider() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let chain = ProviderChain::with_retry(
            vec![Box::new(Flaky {
                calls: std::sync::Arc::clone(&calls),
                failures: 2,
            })],
            3,
            0,
        );
        let value = chain.generate_structured(&request()).await.unwrap();
        assert_eq!(value["from"], "flaky");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn new_chain_fails_over_without_retrying_in_place() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let chain = ProviderChain::new(vec![
            Box::new(Flaky {
                calls: std::sync::Arc::clone(&calls),
                failures: 1,
            }),
            Box::new(Scripted {
                name: "b",
                available: true,
                result: Ok(json!({"from": "b"})),
            }),
        ]);
        let value = chain.generate_structured(&request()).await.unwrap();
        assert_eq!(value["from"], "b");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_chain_reports_unavailable() {
        let chain = ProviderChain::new(vec![]);
        let err = chain.generate_structured(&request()).await.unwrap_err();
        assert!(matches!(err, AiError::Unavailable(_)), "got: {err:?}");
    }
}
