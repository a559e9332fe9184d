//! Enhancement runner: lift marginal reservoir drafts over the
//! promotion threshold.
//!
//! Only drafts in the `[gate, promotion)` band are touched. The rewrite
//! is instructed to expand rather than replace, and the result is
//! rescored with the same deterministic scorer that gated it.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use pressroom_ai::{GenerationRequest, SearchClient, TextGenerator};
use pressroom_core::{AppConfig, SitesFile};
use pressroom_db::{drafts, DraftRow};

use crate::phase::{PhaseFailure, SeoMetadata};
use crate::phases::{parse_response, parse_stored, voice};
use crate::scorer::{score_article, ScoreBreakdown};
use crate::PipelineError;

/// Fixed line the rewrite uses to hand back a new meta description.
pub const REVISED_DESCRIPTION_SENTINEL: &str = "REVISED DESCRIPTION:";

#[derive(Debug, Clone)]
pub struct EnhancementReport {
    pub draft_id: i64,
    pub public_id: Uuid,
    pub old_score: i32,
    pub new_score: i32,
    /// True when the new score cleared the promotion threshold.
    pub promoted: bool,
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    body_html: String,
}

/// Names the concrete, fixable shortfalls the scorer found.
#[must_use]
pub fn diagnose_weaknesses(breakdown: &ScoreBreakdown) -> Vec<String> {
    let mut weaknesses = Vec::new();
    if breakdown.word_count < 2000 {
        weaknesses.push(format!(
            "expand the article to at least 2000 words (currently {})",
            breakdown.word_count
        ));
    }
    if breakdown.h2_count < 4 {
        weaknesses.push(format!(
            "add main sections: {} h2 headings, need at least 4",
            breakdown.h2_count
        ));
    }
    if breakdown.internal_links < 3 {
        weaknesses.push(format!(
            "add internal links: {} markers, need at least 3",
            breakdown.internal_links
        ));
    }
    if !(120..=160).contains(&breakdown.description_len) {
        weaknesses.push(format!(
            "rewrite the meta description to 120-160 characters (currently {})",
            breakdown.description_len
        ));
    }
    weaknesses
}

/// Splits a rewrite on the description sentinel. Everything before the
/// first sentinel is the body; the rest of that line is the new
/// description. No sentinel means the description stays as it was.
#[must_use]
pub fn split_revision(text: &str) -> (String, Option<String>) {
    match text.split_once(REVISED_DESCRIPTION_SENTINEL) {
        Some((body, rest)) => {
            let description = rest.lines().next().unwrap_or("").trim().to_string();
            let description = (!description.is_empty()).then_some(description);
            (body.trim_end().to_string(), description)
        }
        None => (text.to_string(), None),
    }
}

/// Enhances every marginal reservoir draft, up to `limit`.
///
/// # Errors
///
/// Returns [`PipelineError`] on database failure. Per-draft enhancement
/// failures are logged and skipped so one bad draft cannot starve the
/// rest.
pub async fn run_enhancement(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &dyn TextGenerator,
    search: Option<&SearchClient>,
    config: &AppConfig,
    limit: i64,
) -> Result<Vec<EnhancementReport>, PipelineError> {
    let candidates = drafts::list_marginal_reservoir_drafts(
        pool,
        config.gate_threshold,
        config.promote_threshold,
        limit,
    )
    .await?;

    let mut reports = Vec::new();
    for draft in candidates {
        match enhance_one(pool, sites, generator, search, config, &draft).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(draft = %draft.public_id, error = %e, "enhancement skipped");
            }
        }
    }

    Ok(reports)
}

/// Enhances one draft by public id, for the on-demand API path.
///
/// # Errors
///
/// Returns [`PipelineError::NotEnhanceable`] when the draft is not a
/// marginal reservoir draft, or [`PipelineError`] on other failures.
pub async fn enhance_draft(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &dyn TextGenerator,
    search: Option<&SearchClient>,
    config: &AppConfig,
    public_id: Uuid,
) -> Result<EnhancementReport, PipelineError> {
    let draft = drafts::get_draft_by_public_id(pool, public_id).await?;
    if draft.phase != "reservoir" {
        return Err(PipelineError::NotEnhanceable(format!(
            "draft {public_id} is in phase '{}', not 'reservoir'",
            draft.phase
        )));
    }
    let Some(score) = draft.score else {
        return Err(PipelineError::NotEnhanceable(format!(
            "draft {public_id} has no score"
        )));
    };
    if score < config.gate_threshold || score >= config.promote_threshold {
        return Err(PipelineError::NotEnhanceable(format!(
            "draft {public_id} scores {score}, outside the [{}, {}) enhancement band",
            config.gate_threshold, config.promote_threshold
        )));
    }

    enhance_one(pool, sites, generator, search, config, &draft).await
}

async fn enhance_one(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &dyn TextGenerator,
    search: Option<&SearchClient>,
    config: &AppConfig,
    draft: &DraftRow,
) -> Result<EnhancementReport, PipelineError> {
    let site = sites
        .by_slug(&draft.site_slug)
        .ok_or_else(|| PipelineError::UnknownSite(draft.site_slug.clone()))?;
    let body_html = draft
        .body_html
        .as_deref()
        .ok_or_else(|| PhaseFailure::new("reservoir draft has no body"))?;
    let mut seo: SeoMetadata = parse_stored(draft.seo.as_ref(), "seo")?;

    let breakdown = score_article(body_html, &seo, &draft.keyword);
    let old_score = breakdown.total;
    let weaknesses = diagnose_weaknesses(&breakdown);

    let research = fresh_research(search, &draft.keyword).await;

    let prompt = format!(
        "Improve this published-candidate article (keyword \
         \"{keyword}\").\n\n\
         Weaknesses to fix:\n{weaknesses}\n\n\
         Fresh research:\n{research}\n\n\
         Rules:\n\
         - EXPAND the existing article; never replace or shorten what is \
           already there\n\
         - Keep every existing heading and every class=\"internal-link\" \
           and class=\"affiliate-slot\" marker\n\
         - Meet the structural minimums named in the weaknesses\n\
         - After the article body, add one final line starting with \
           \"{sentinel}\" followed by a new 120-160 character meta \
           description\n\n\
         Current article:\n{body}\n\n\
         Respond with a single JSON object: {{\"body_html\": string}} \
         where the string is the revised article plus the final \
         description line.",
        keyword = draft.keyword,
        weaknesses = bullet_list(&weaknesses),
        research = research,
        sentinel = REVISED_DESCRIPTION_SENTINEL,
        body = body_html,
    );

    let request = GenerationRequest::new(voice(site, &draft.locale), prompt)
        .with_max_tokens(8192);
    let value = generator
        .generate_structured(&request)
        .await
        .map_err(PhaseFailure::from)?;
    let response: RewriteResponse = parse_response(value, "enhancement")?;

    let (new_body, new_description) = split_revision(&response.body_html);
    if let Some(description) = new_description {
        seo.meta_description = description;
    }

    let new_score = score_article(&new_body, &seo, &draft.keyword).total;
    let promoted = new_score >= config.promote_threshold;

    let seo_value = serde_json::to_value(&seo)
        .map_err(|e| PhaseFailure::new(format!("could not serialize seo metadata: {e}")))?;
    drafts::store_enhancement(pool, draft.id, &new_body, &seo_value, new_score, promoted).await?;

    tracing::info!(
        draft = %draft.public_id,
        old_score,
        new_score,
        promoted,
        "enhancement stored"
    );

    Ok(EnhancementReport {
        draft_id: draft.id,
        public_id: draft.public_id,
        old_score,
        new_score,
        promoted,
        weaknesses,
    })
}

/// Search is strictly best-effort here: no key, a dead endpoint, or an
/// API error all degrade to a placeholder.
async fn fresh_research(search: Option<&SearchClient>, keyword: &str) -> String {
    let Some(client) = search else {
        return "(no fresh research available)".to_string();
    };
    match client.search(keyword, 5).await {
        Ok(results) if !results.is_empty() => results
            .iter()
            .map(|r| format!("- {}: {}", r.title, r.snippet))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(_) => "(no fresh research available)".to_string(),
        Err(e) => {
            tracing::warn!(keyword, error = %e, "enhancement research degraded");
            "(no fresh research available)".to_string()
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- none; polish and tighten".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weaknesses_name_each_concrete_shortfall() {
        let breakdown = ScoreBreakdown {
            word_count: 1400,
            h2_count: 2,
            internal_links: 1,
            description_len: 80,
            ..ScoreBreakdown::default()
        };
        let weaknesses = diagnose_weaknesses(&breakdown);
        assert_eq!(weaknesses.len(), 4);
        assert!(weaknesses[0].contains("2000 words"));
        assert!(weaknesses[1].contains("2 h2"));
        assert!(weaknesses[2].contains("1 markers"));
        assert!(weaknesses[3].contains("currently 80"));
    }

    #[test]
    fn healthy_breakdown_has_no_weaknesses() {
        let breakdown = ScoreBreakdown {
            word_count: 2200,
            h2_count: 5,
            internal_links: 4,
            description_len: 140,
            ..ScoreBreakdown::default()
        };
        assert!(diagnose_weaknesses(&breakdown).is_empty());
    }

    #[test]
    fn split_revision_extracts_the_description_line() {
        let text = "<p>body</p>\nREVISED DESCRIPTION: A fresh description here.";
        let (body, description) = split_revision(text);
        assert_eq!(body, "<p>body</p>");
        assert_eq!(description.as_deref(), Some("A fresh description here."));
    }

    #[test]
    fn split_revision_without_sentinel_keeps_everything_as_body() {
        let (body, description) = split_revision("<p>just body</p>");
        assert_eq!(body, "<p>just body</p>");
        assert!(description.is_none());
    }

    #[test]
    fn split_revision_ignores_text_after_the_description_line() {
        let text = "<p>b</p>\nREVISED DESCRIPTION: desc here\ntrailing noise";
        let (_, description) = split_revision(text);
        assert_eq!(description.as_deref(), Some("desc here"));
    }

    #[test]
    fn empty_sentinel_line_means_no_description() {
        let (_, description) = split_revision("<p>b</p>\nREVISED DESCRIPTION:   ");
        assert!(description.is_none());
    }
}
