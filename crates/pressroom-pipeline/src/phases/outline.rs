//! Outline phase: turn research into an ordered section plan.

use pressroom_ai::GenerationRequest;
use pressroom_db::DraftRow;

use crate::phase::{ArticleOutline, Phase, PhaseFailure, PhaseOutcome, PhaseOutput, ResearchData};
use crate::phases::{parse_response, parse_stored, voice, PhaseContext};

/// # Errors
///
/// Returns [`PhaseFailure`] when the research payload is missing, the
/// provider call fails, or the outline comes back unusable.
pub async fn run(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let research: ResearchData = parse_stored(draft.research.as_ref(), "research")?;

    let alt_title_instruction = match &ctx.site.alternate_locale {
        Some(alt) => format!(
            "- \"title_alt\": the title translated for the {alt} locale\n"
        ),
        None => String::new(),
    };

    let prompt = format!(
        "Plan a long-form article for the keyword \"{keyword}\" on \
         \"{site}\".\n\
         Research findings:\n{research}\n\n\
         Target roughly {words} words across {headings} main sections.\n\n\
         Respond with a single JSON object:\n\
         - \"title\": the article title\n\
         {alt_title_instruction}\
         - \"hook\": the opening line the first section must lead with\n\
         - \"call_to_action\": the close the last section must land on\n\
         - \"sections\": ordered array of objects with \"heading\", \
           \"target_words\" (integer), \"key_points\" (array), \
           \"keywords\" (array), \"link_opportunities\" (array)\n\
         - \"affiliate_plan\": array of product/service placements\n\
         - \"internal_link_plan\": array of on-site pages to link\n\
         - \"schema_type\": the schema.org type that fits this article",
        keyword = draft.keyword,
        site = ctx.site.name,
        research = serde_json::to_string(&research).unwrap_or_default(),
        words = research.recommended_word_count,
        headings = research.recommended_heading_count,
    );

    let request = GenerationRequest::new(voice(ctx.site, &draft.locale), prompt);
    let value = ctx.generator.generate_structured(&request).await?;
    let outline: ArticleOutline = parse_response(value, "outline")?;

    if outline.title.trim().is_empty() {
        return Err(PhaseFailure::new("outline came back without a title"));
    }
    if outline.sections.is_empty() {
        return Err(PhaseFailure::new("outline came back with no sections"));
    }

    tracing::debug!(
        draft = %draft.public_id,
        sections = outline.sections.len(),
        "outline complete"
    );

    Ok(PhaseOutcome {
        next_phase: Phase::Drafting,
        output: PhaseOutput::Outline { outline },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft_in_phase, site, StaticGenerator};
    use serde_json::json;

    fn draft_with_research() -> DraftRow {
        let mut draft = draft_in_phase("outline");
        draft.research = Some(json!({
            "competitor_headings": [],
            "audience_intent": "",
            "keyword_clusters": [],
            "recommended_word_count": 1500,
            "recommended_heading_count": 4
        }));
        draft
    }

    #[tokio::test]
    async fn outline_sets_section_counters_and_advances() {
        let generator = StaticGenerator::ok(json!({
            "title": "The Title",
            "hook": "Imagine this.",
            "call_to_action": "Book today.",
            "sections": [
                { "heading": "First" },
                { "heading": "Second" },
                { "heading": "Third" }
            ]
        }));
        let site = site();
        let ctx = PhaseContext {
            site: &site,
            generator: &generator,
            gate_threshold: 50,
        };

        let outcome = run(&draft_with_research(), &ctx).await.unwrap();
        assert_eq!(outcome.next_phase, Phase::Drafting);
        let patch = outcome.output.to_patch();
        assert_eq!(patch.sections_total, Some(3));
        assert_eq!(patch.sections_completed, Some(0));
    }

    #[tokio::test]
    async fn empty_section_list_is_a_phase_failure() {
        let generator = StaticGenerator::ok(json!({
            "title": "The Title",
            "sections": []
        }));
        let site = site();
        let ctx = PhaseContext {
            site: &site,
            generator: &generator,
            gate_threshold: 50,
        };

        let err = run(&draft_with_research(), &ctx).await.unwrap_err();
        assert!(err.message.contains("no sections"), "{}", err.message);
    }

    #[tokio::test]
    async fn missing_research_payload_fails_before_calling_the_provider() {
        let generator = StaticGenerator::ok(json!({}));
        let site = site();
        let ctx = PhaseContext {
            site: &site,
            generator: &generator,
            gate_threshold: 50,
        };
        let draft = draft_in_phase("outline");

        let err = run(&draft, &ctx).await.unwrap_err();
        assert!(err.message.contains("research"), "{}", err.message);
    }
}
