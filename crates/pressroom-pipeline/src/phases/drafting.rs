//! Drafting phase: one section per invocation, in outline order.
//!
//! Incremental by design so that a budget-paused or crashed run loses at
//! most one section. Continuity comes from feeding the tail of the two
//! most recent sections back into the prompt.

use serde::Deserialize;

use pressroom_ai::GenerationRequest;
use pressroom_db::DraftRow;

use crate::phase::{ArticleOutline, Phase, PhaseFailure, PhaseOutcome, PhaseOutput, SectionDraft};
use crate::phases::{parse_response, parse_stored, voice, PhaseContext};
use crate::scorer::strip_tags;

/// Per-section continuity window, in characters.
const CONTEXT_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct SectionResponse {
    #[serde(default)]
    heading: Option<String>,
    html: String,
}

/// # Errors
///
/// Returns [`PhaseFailure`] when the outline payload is missing or the
/// provider call fails.
pub async fn run(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let outline: ArticleOutline = parse_stored(draft.outline.as_ref(), "outline")?;
    let mut sections: Vec<SectionDraft> = match draft.sections.as_ref() {
        Some(_) => parse_stored(draft.sections.as_ref(), "sections")?,
        None => Vec::new(),
    };

    let total = outline.sections.len();
    let index = usize::try_from(draft.sections_completed.max(0)).unwrap_or(0);
    if index >= total {
        // Every section already exists (a replay after a lost advance
        // race); just move on.
        return Ok(PhaseOutcome {
            next_phase: Phase::Assembly,
            output: PhaseOutput::Section {
                sections,
                sections_completed: draft.sections_completed,
            },
        });
    }

    let plan = &outline.sections[index];

    let context = sections
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|s| {
            let tail: String = s.html.chars().take(CONTEXT_CHARS).collect();
            format!("## {}\n{}", s.heading, tail)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut directives = vec![format!(
        "Write roughly {} words of HTML (paragraphs, lists, h3/h4 \
         subheadings as needed). Do NOT include the section heading itself.",
        if plan.target_words == 0 { 300 } else { plan.target_words }
    )];
    if index == 0 {
        directives.push(format!("Open with this hook: \"{}\"", outline.hook));
    }
    if index + 1 == total {
        directives.push(format!(
            "Close with this call to action: \"{}\"",
            outline.call_to_action
        ));
    }

    let prompt = format!(
        "You are writing section {number} of {total} of the article \
         \"{title}\" (keyword \"{keyword}\").\n\
         Section heading: \"{heading}\"\n\
         Key points to cover: {key_points:?}\n\
         Keywords to work in naturally: {keywords:?}\n\
         Linking opportunities: {links:?}\n\n\
         Previously written (for continuity, do not repeat):\n{context}\n\n\
         {directives}\n\n\
         Respond with a single JSON object: {{\"heading\": string, \
         \"html\": string}}.",
        number = index + 1,
        total = total,
        title = outline.title,
        keyword = draft.keyword,
        heading = plan.heading,
        key_points = plan.key_points,
        keywords = plan.keywords,
        links = plan.link_opportunities,
        context = if context.is_empty() {
            "(none yet)"
        } else {
            context.as_str()
        },
        directives = directives.join("\n"),
    );

    let request = GenerationRequest::new(voice(ctx.site, &draft.locale), prompt);
    let value = ctx.generator.generate_structured(&request).await?;
    let response: SectionResponse = parse_response(value, "section")?;

    let word_count = strip_tags(&response.html).split_whitespace().count();
    sections.push(SectionDraft {
        heading: response.heading.unwrap_or_else(|| plan.heading.clone()),
        html: response.html,
        word_count: u32::try_from(word_count).unwrap_or(u32::MAX),
    });

    let completed = index + 1;
    let next_phase = if completed == total {
        Phase::Assembly
    } else {
        Phase::Drafting
    };

    tracing::debug!(
        draft = %draft.public_id,
        section = completed,
        total,
        words = word_count,
        "section drafted"
    );

    Ok(PhaseOutcome {
        next_phase,
        output: PhaseOutput::Section {
            sections,
            sections_completed: i32::try_from(completed).unwrap_or(i32::MAX),
        },
    })
}
