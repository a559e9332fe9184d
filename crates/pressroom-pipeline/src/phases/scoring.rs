//! Scoring phase: deterministic gate, no AI involved.

use pressroom_db::DraftRow;

use crate::phase::{Phase, PhaseFailure, PhaseOutcome, PhaseOutput, SeoMetadata};
use crate::phases::parse_stored;
use crate::scorer::{readability_estimate, score_article};

/// Routes to `reservoir` iff the score clears the gate threshold,
/// otherwise to `rejected` with a reason the diagnoser recognizes.
///
/// # Errors
///
/// Returns [`PhaseFailure`] when the body or SEO payload is missing.
pub fn run(draft: &DraftRow, gate_threshold: i32) -> Result<PhaseOutcome, PhaseFailure> {
    let body_html = draft
        .body_html
        .as_deref()
        .ok_or_else(|| PhaseFailure::new("draft has no assembled body to score"))?;
    let seo: SeoMetadata = parse_stored(draft.seo.as_ref(), "seo")?;

    let breakdown = score_article(body_html, &seo, &draft.keyword);
    let readability = readability_estimate(body_html);

    let (next_phase, rejection_reason) = if breakdown.total >= gate_threshold {
        (Phase::Reservoir, None)
    } else {
        (
            Phase::Rejected,
            Some(format!(
                "quality gate: score {} below threshold {gate_threshold} \
                 ({} words, {} h2, {} internal links)",
                breakdown.total, breakdown.word_count, breakdown.h2_count, breakdown.internal_links
            )),
        )
    };

    tracing::info!(
        draft = %draft.public_id,
        score = breakdown.total,
        gate = gate_threshold,
        outcome = %next_phase,
        "draft scored"
    );

    Ok(PhaseOutcome {
        next_phase,
        output: PhaseOutput::Scoring {
            score: breakdown.total,
            readability,
            rejection_reason,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::draft_in_phase;
    use serde_json::json;

    fn scoring_draft(words: usize) -> DraftRow {
        let mut draft = draft_in_phase("scoring");
        let mut body = String::from(
            "<h2>A</h2><h2>B</h2><h2>C</h2><h2>D</h2><h3>a</h3><h3>b</h3>\
             <a class=\"internal-link\" href=\"/1\">x</a>\
             <a class=\"internal-link\" href=\"/2\">x</a>\
             <a class=\"internal-link\" href=\"/3\">x</a>\
             <div class=\"affiliate-slot\"></div>\
             <div class=\"affiliate-slot\"></div><p>",
        );
        for _ in 0..words {
            body.push_str("word ");
        }
        body.push_str("coastal trail guide</p>");
        draft.body_html = Some(body);
        draft.keyword = "coastal trail guide".to_string();
        draft.seo = Some(json!({
            "title_tag": "Coastal Trail Guide for Slow Mornings",
            "meta_description": "d".repeat(140),
            "structured_data": { "@type": "Article" }
        }));
        draft
    }

    #[test]
    fn strong_draft_routes_to_reservoir() {
        let outcome = run(&scoring_draft(2100), 50).unwrap();
        assert_eq!(outcome.next_phase, Phase::Reservoir);
        let PhaseOutput::Scoring {
            score,
            rejection_reason,
            ..
        } = outcome.output
        else {
            panic!("wrong variant");
        };
        assert!(score >= 50, "score was {score}");
        assert!(rejection_reason.is_none());
    }

    #[test]
    fn weak_draft_routes_to_rejected_with_reason() {
        let mut draft = draft_in_phase("scoring");
        draft.body_html = Some("<p>short</p>".to_string());
        draft.seo = Some(json!({}));

        let outcome = run(&draft, 50).unwrap();
        assert_eq!(outcome.next_phase, Phase::Rejected);
        let PhaseOutput::Scoring {
            rejection_reason, ..
        } = outcome.output
        else {
            panic!("wrong variant");
        };
        let reason = rejection_reason.unwrap();
        assert!(reason.contains("quality gate"), "{reason}");
        assert!(reason.contains("below threshold 50"), "{reason}");
    }

    #[test]
    fn scoring_is_reproducible() {
        let draft = scoring_draft(1600);
        let a = run(&draft, 50).unwrap();
        let b = run(&draft, 50).unwrap();
        let (PhaseOutput::Scoring { score: sa, .. }, PhaseOutput::Scoring { score: sb, .. }) =
            (a.output, b.output)
        else {
            panic!("wrong variant");
        };
        assert_eq!(sa, sb);
    }

    #[test]
    fn gate_threshold_is_inclusive() {
        // a draft scoring exactly the gate value lands in reservoir
        let draft = scoring_draft(2100);
        let outcome = run(&draft, 95).unwrap();
        assert_eq!(outcome.next_phase, Phase::Reservoir);
        let outcome = run(&draft, 96).unwrap();
        assert_eq!(outcome.next_phase, Phase::Rejected);
    }
}
