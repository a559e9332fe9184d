//! Publication seam.
//!
//! Pushing an article to its destination is deliberately behind a trait:
//! the pipeline only needs a URL back. The default implementation stages
//! the article under the site's destination without any remote call,
//! which is the correct behavior until a concrete destination
//! integration is wired in.

use async_trait::async_trait;
use thiserror::Error;

use pressroom_core::SiteConfig;
use pressroom_db::DraftRow;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publication failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PublishedArticle {
    pub url: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Pushes a reservoir draft to the site's destination and returns
    /// the canonical URL.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the destination refuses the
    /// article.
    async fn publish(
        &self,
        site: &SiteConfig,
        draft: &DraftRow,
    ) -> Result<PublishedArticle, PublishError>;
}

/// Default publisher: derives the canonical URL from the site
/// destination and the keyword slug, performing no remote call.
pub struct StagingPublisher;

#[async_trait]
impl Publisher for StagingPublisher {
    async fn publish(
        &self,
        site: &SiteConfig,
        draft: &DraftRow,
    ) -> Result<PublishedArticle, PublishError> {
        let url = format!(
            "https://{}/{}/{}",
            site.destination.trim_end_matches('/'),
            draft.locale,
            slugify(&draft.keyword)
        );
        tracing::info!(draft = %draft.public_id, url, "staged article for publication");
        Ok(PublishedArticle { url })
    }
}

fn slugify(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
