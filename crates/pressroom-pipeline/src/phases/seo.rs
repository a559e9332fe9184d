//! SEO phase: title tag, meta description, keywords, structured data.

use pressroom_ai::GenerationRequest;
use pressroom_db::DraftRow;

use crate::phase::{ArticleOutline, Phase, PhaseFailure, PhaseOutcome, PhaseOutput, SeoMetadata};
use crate::phases::{parse_response, parse_stored, voice, PhaseContext};
use crate::scorer::strip_tags;

/// # Errors
///
/// Returns [`PhaseFailure`] when the body is missing or the provider
/// call fails.
pub async fn run(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let outline: ArticleOutline = parse_stored(draft.outline.as_ref(), "outline")?;
    let body_html = draft
        .body_html
        .as_deref()
        .ok_or_else(|| PhaseFailure::new("draft has no assembled body to optimize"))?;

    let excerpt: String = strip_tags(body_html).chars().take(1500).collect();
    let schema_hint = outline.schema_type.as_deref().unwrap_or("Article");

    let prompt = format!(
        "Produce SEO metadata for the article \"{title}\" \
         (keyword \"{keyword}\").\n\
         Opening of the article:\n{excerpt}\n\n\
         Respond with a single JSON object:\n\
         - \"title_tag\": at most 60 characters\n\
         - \"meta_description\": 120 to 160 characters\n\
         - \"keywords\": array of keyword phrases\n\
         - \"structured_data\": a schema.org JSON-LD object of type \
           \"{schema_hint}\"\n\
         - \"link_suggestions\": array of on-site pages worth linking\n\
         - \"image_suggestions\": array of image descriptions",
        title = outline.title,
        keyword = draft.keyword,
    );

    let request = GenerationRequest::new(voice(ctx.site, &draft.locale), prompt);
    let value = ctx.generator.generate_structured(&request).await?;
    let seo: SeoMetadata = parse_response(value, "seo")?;

    tracing::debug!(
        draft = %draft.public_id,
        title_len = seo.title_tag.chars().count(),
        description_len = seo.meta_description.chars().count(),
        "seo metadata complete"
    );

    Ok(PhaseOutcome {
        next_phase: Phase::Scoring,
        output: PhaseOutput::Seo { seo },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft_in_phase, site, StaticGenerator};
    use serde_json::json;

    #[tokio::test]
    async fn seo_advances_to_scoring() {
        let generator = StaticGenerator::ok(json!({
            "title_tag": "Coastal Hiking Trails Worth the Drive",
            "meta_description": "m".repeat(140),
            "keywords": ["coastal hiking"],
            "structured_data": { "@type": "Article" }
        }));
        let site = site();
        let ctx = PhaseContext {
            site: &site,
            generator: &generator,
            gate_threshold: 50,
        };
        let mut draft = draft_in_phase("seo");
        draft.outline = Some(json!({ "title": "T", "sections": [{ "heading": "A" }] }));
        draft.body_html = Some("<h2>A</h2><p>words</p>".to_string());

        let outcome = run(&draft, &ctx).await.unwrap();
        assert_eq!(outcome.next_phase, Phase::Scoring);
        let PhaseOutput::Seo { seo } = outcome.output else {
            panic!("wrong variant");
        };
        assert!(seo.structured_data.is_some());
    }

    #[tokio::test]
    async fn missing_body_is_a_phase_failure() {
        let generator = StaticGenerator::ok(json!({}));
        let site = site();
        let ctx = PhaseContext {
            site: &site,
            generator: &generator,
            gate_threshold: 50,
        };
        let mut draft = draft_in_phase("seo");
        draft.outline = Some(json!({ "title": "T", "sections": [{ "heading": "A" }] }));

        let err = run(&draft, &ctx).await.unwrap_err();
        assert!(err.message.contains("no assembled body"), "{}", err.message);
    }
}
