//! Assembly phase: merge the drafted sections into one article body.
//!
//! The merge itself is deterministic (headings emitted as h2, depth
//! clamped to h2–h4); the AI call smooths transitions and inserts the
//! link and affiliate markers the scorer later counts. The
//! alternate-locale summary is best-effort and never fails the phase.

use regex::Regex;
use serde::Deserialize;

use pressroom_ai::GenerationRequest;
use pressroom_db::DraftRow;

use crate::phase::{ArticleOutline, Phase, PhaseFailure, PhaseOutcome, PhaseOutput, SectionDraft};
use crate::phases::{parse_response, parse_stored, voice, PhaseContext};
use crate::scorer::{AFFILIATE_MARKER, INTERNAL_LINK_MARKER};

#[derive(Debug, Deserialize)]
struct AssemblyResponse {
    body_html: String,
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    summary_html: String,
}

/// Clamps heading depth to the h2–h4 band: h1 becomes h2, h5 and h6
/// become h4.
#[must_use]
pub fn clamp_heading_depth(html: &str) -> String {
    let re = Regex::new(r"(?i)(</?)h([1-6])").expect("valid heading regex");
    re.replace_all(html, |caps: &regex::Captures<'_>| {
        let level = match &caps[2] {
            "1" => "2",
            "5" | "6" => "4",
            other => other,
        };
        format!("{}h{}", &caps[1], level)
    })
    .into_owned()
}

/// # Errors
///
/// Returns [`PhaseFailure`] when outline or sections are missing or the
/// smoothing call fails.
pub async fn run(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let outline: ArticleOutline = parse_stored(draft.outline.as_ref(), "outline")?;
    let sections: Vec<SectionDraft> = parse_stored(draft.sections.as_ref(), "sections")?;
    if sections.is_empty() {
        return Err(PhaseFailure::new("no drafted sections to assemble"));
    }

    let raw_body = sections
        .iter()
        .map(|s| format!("<h2>{}</h2>\n{}", s.heading, s.html))
        .collect::<Vec<_>>()
        .join("\n");
    let raw_body = clamp_heading_depth(&raw_body);

    let prompt = format!(
        "Polish this assembled article (\"{title}\", keyword \
         \"{keyword}\") into its final form.\n\n\
         Requirements:\n\
         - Smooth the transitions between sections; remove duplicated \
           points\n\
         - Keep every <h2> section; do not drop content\n\
         - Insert at least 3 internal links as \
           <a {internal_marker} href=\"...\">...</a>, drawing from: \
           {internal_plan:?}\n\
         - Insert at least 2 affiliate placements as \
           <div {affiliate_marker}>...</div>, drawing from: \
           {affiliate_plan:?}\n\n\
         Article:\n{body}\n\n\
         Respond with a single JSON object: {{\"body_html\": string}}.",
        title = outline.title,
        keyword = draft.keyword,
        internal_marker = INTERNAL_LINK_MARKER,
        internal_plan = outline.internal_link_plan,
        affiliate_marker = AFFILIATE_MARKER,
        affiliate_plan = outline.affiliate_plan,
        body = raw_body,
    );

    let request = GenerationRequest::new(voice(ctx.site, &draft.locale), prompt)
        .with_max_tokens(8192);
    let value = ctx.generator.generate_structured(&request).await?;
    let response: AssemblyResponse = parse_response(value, "assembly")?;
    let body_html = clamp_heading_depth(&response.body_html);

    let body_html_alt = match &ctx.site.alternate_locale {
        Some(alt_locale) => translate_summary(draft, ctx, alt_locale, &body_html).await,
        None => None,
    };

    tracing::debug!(
        draft = %draft.public_id,
        bytes = body_html.len(),
        has_alt = body_html_alt.is_some(),
        "assembly complete"
    );

    Ok(PhaseOutcome {
        next_phase: Phase::Seo,
        output: PhaseOutput::Assembly {
            body_html,
            body_html_alt,
        },
    })
}

/// Best-effort alternate-locale summary. A failure here is logged and
/// swallowed; the primary article is not held hostage to translation.
async fn translate_summary(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
    alt_locale: &str,
    body_html: &str,
) -> Option<String> {
    let excerpt: String = body_html.chars().take(4000).collect();
    let prompt = format!(
        "Summarize and translate this article into the {alt_locale} \
         locale as 3-4 HTML paragraphs.\n\n{excerpt}\n\n\
         Respond with a single JSON object: {{\"summary_html\": string}}."
    );
    let request = GenerationRequest::new(voice(ctx.site, alt_locale), prompt);

    match ctx.generator.generate_structured(&request).await {
        Ok(value) => match parse_response::<TranslationResponse>(value, "translation") {
            Ok(r) => Some(r.summary_html),
            Err(e) => {
                tracing::warn!(draft = %draft.public_id, error = %e, "translation unusable");
                None
            }
        },
        Err(e) => {
            tracing::warn!(draft = %draft.public_id, error = %e, "translation failed");
            None
        }
    }
}
