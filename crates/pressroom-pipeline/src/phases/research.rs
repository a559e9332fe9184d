//! Research phase: one structured AI call sizing up the keyword.

use pressroom_ai::GenerationRequest;
use pressroom_db::DraftRow;

use crate::phase::{Phase, PhaseFailure, PhaseOutcome, PhaseOutput, ResearchData};
use crate::phases::{parse_response, voice, PhaseContext};

/// # Errors
///
/// Returns [`PhaseFailure`] when the provider call fails or its output
/// cannot be read as research data.
pub async fn run(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let prompt = format!(
        "You are researching a long-form article for the site \"{site}\" \
         (published on {destination}, locale {locale}).\n\
         Target keyword: \"{keyword}\".\n\n\
         Respond with a single JSON object with these keys:\n\
         - \"competitor_headings\": array of strings, the section headings \
           top-ranking articles for this keyword use\n\
         - \"audience_intent\": one paragraph on what the searcher wants\n\
         - \"keyword_clusters\": array of closely related keyword phrases\n\
         - \"recommended_word_count\": integer, target length for a \
           competitive article\n\
         - \"recommended_heading_count\": integer, how many main sections \
           the article should have",
        site = ctx.site.name,
        destination = ctx.site.destination,
        locale = draft.locale,
        keyword = draft.keyword,
    );

    let request = GenerationRequest::new(voice(ctx.site, &draft.locale), prompt);
    let value = ctx.generator.generate_structured(&request).await?;
    let data: ResearchData = parse_response(value, "research")?;

    tracing::debug!(
        draft = %draft.public_id,
        keyword = %draft.keyword,
        recommended_words = data.recommended_word_count,
        "research complete"
    );

    Ok(PhaseOutcome {
        next_phase: Phase::Outline,
        output: PhaseOutput::Research { data },
    })
}
