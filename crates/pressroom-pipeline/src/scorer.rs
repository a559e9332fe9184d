//! Deterministic quality scorer.
//!
//! Pure function of the article body, its SEO metadata, and the target
//! keyword. No AI, no I/O, no clock: identical inputs always produce
//! identical scores, which is what makes the gate auditable and the
//! rescore after enhancement comparable.

use crate::phase::SeoMetadata;

/// Greppable marker classes the assembly phase is instructed to emit.
pub const INTERNAL_LINK_MARKER: &str = "class=\"internal-link\"";
pub const AFFILIATE_MARKER: &str = "class=\"affiliate-slot\"";

/// Per-criterion points plus the raw counts they were derived from.
///
/// The counts are kept so the enhancement runner can name concrete
/// weaknesses ("2 h2 headings, need 4") instead of guessing from the
/// total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub word_count: usize,
    pub h2_count: usize,
    pub h3_count: usize,
    pub internal_links: usize,
    pub affiliate_slots: usize,
    pub title_len: usize,
    pub description_len: usize,

    pub word_points: i32,
    pub title_points: i32,
    pub description_points: i32,
    pub structured_data_points: i32,
    pub heading_points: i32,
    pub internal_link_points: i32,
    pub affiliate_points: i32,
    pub keyword_points: i32,

    pub total: i32,
}

/// Scores an assembled article. Total is clamped to `[0, 100]`.
#[must_use]
pub fn score_article(body_html: &str, seo: &SeoMetadata, keyword: &str) -> ScoreBreakdown {
    let text = strip_tags(body_html);
    let word_count = text.split_whitespace().count();

    let word_points = match word_count {
        n if n >= 2000 => 30,
        n if n >= 1500 => 25,
        n if n >= 1200 => 20,
        n if n >= 800 => 10,
        _ => 5,
    };

    let title_len = seo.title_tag.chars().count();
    let title_points = if (10..=60).contains(&title_len) { 10 } else { 0 };

    let description_len = seo.meta_description.chars().count();
    let description_points = if (120..=160).contains(&description_len) {
        10
    } else {
        0
    };

    let structured_data_points = if seo.structured_data.is_some() { 10 } else { 0 };

    let h2_count = count_occurrences(body_html, "<h2");
    let h3_count = count_occurrences(body_html, "<h3");
    let mut heading_points = 0;
    if h2_count >= 4 {
        heading_points += 10;
    }
    if h3_count >= 2 {
        heading_points += 5;
    }

    let internal_links = count_occurrences(body_html, INTERNAL_LINK_MARKER);
    let internal_link_points = match internal_links {
        n if n >= 3 => 10,
        n if n >= 1 => 5,
        _ => 0,
    };

    let affiliate_slots = count_occurrences(body_html, AFFILIATE_MARKER);
    let affiliate_points = match affiliate_slots {
        n if n >= 2 => 5,
        n if n >= 1 => 2,
        _ => 0,
    };

    let keyword_points = if !keyword.is_empty()
        && text.to_lowercase().contains(&keyword.to_lowercase())
    {
        5
    } else {
        0
    };

    let total = (word_points
        + title_points
        + description_points
        + structured_data_points
        + heading_points
        + internal_link_points
        + affiliate_points
        + keyword_points)
        .clamp(0, 100);

    ScoreBreakdown {
        word_count,
        h2_count,
        h3_count,
        internal_links,
        affiliate_slots,
        title_len,
        description_len,
        word_points,
        title_points,
        description_points,
        structured_data_points,
        heading_points,
        internal_link_points,
        affiliate_points,
        keyword_points,
        total,
    }
}

/// Average words per sentence over the tag-stripped body. Read-only
/// companion metric; never feeds the gate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn readability_estimate(body_html: &str) -> f32 {
    let text = strip_tags(body_html);
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }

    let total_words: usize = sentences
        .iter()
        .map(|s| s.split_whitespace().count())
        .sum();
    total_words as f32 / sentences.len() as f32
}

/// Drops everything between `<` and `>`. Good enough for counting words
/// in markup the pipeline itself produced.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seo(title: &str, description: &str, structured: bool) -> SeoMetadata {
        SeoMetadata {
            title_tag: title.to_string(),
            meta_description: description.to_string(),
            structured_data: structured.then(|| serde_json::json!({"@type": "Article"})),
            ..SeoMetadata::default()
        }
    }

    fn body_with(words: usize, h2: usize, h3: usize, links: usize, slots: usize) -> String {
        let mut body = String::new();
        for _ in 0..h2 {
            body.push_str("<h2>Heading</h2>");
        }
        for _ in 0..h3 {
            body.push_str("<h3>Sub</h3>");
        }
        for _ in 0..links {
            body.push_str("<a class=\"internal-link\" href=\"/x\">more</a>");
        }
        for _ in 0..slots {
            body.push_str("<div class=\"affiliate-slot\"></div>");
        }
        body.push_str("<p>");
        for _ in 0..words {
            body.push_str("word ");
        }
        body.push_str("</p>");
        body
    }

    #[test]
    fn full_marks_scenario_clears_the_gate() {
        let mut body = body_with(2100, 4, 2, 3, 2);
        body.push_str("<p>coastal hiking trails</p>");
        let meta = seo(
            "Coastal Hiking Trails Worth the Drive",
            &"d".repeat(140),
            true,
        );

        let breakdown = score_article(&body, &meta, "coastal hiking trails");
        assert_eq!(breakdown.word_points, 30);
        assert_eq!(breakdown.title_points, 10);
        assert_eq!(breakdown.description_points, 10);
        assert_eq!(breakdown.structured_data_points, 10);
        assert_eq!(breakdown.heading_points, 15);
        assert_eq!(breakdown.internal_link_points, 10);
        assert_eq!(breakdown.affiliate_points, 5);
        assert_eq!(breakdown.keyword_points, 5);
        assert_eq!(breakdown.total, 95);
        assert!(breakdown.total >= 50);
    }

    #[test]
    fn scoring_is_deterministic() {
        let body = body_with(1600, 5, 3, 2, 1);
        let meta = seo("A mid-length title here", &"d".repeat(125), false);
        let first = score_article(&body, &meta, "word");
        let second = score_article(&body, &meta, "word");
        assert_eq!(first, second);
    }

    #[test]
    fn word_count_bands() {
        let meta = seo("", "", false);
        for (words, expected) in [(2000, 30), (1500, 25), (1200, 20), (800, 10), (799, 5)] {
            let body = body_with(words, 0, 0, 0, 0);
            let b = score_article(&body, &meta, "");
            assert_eq!(b.word_points, expected, "words = {words}");
        }
    }

    #[test]
    fn title_and_description_bounds_are_inclusive() {
        let body = body_with(10, 0, 0, 0, 0);
        for (len, expected) in [(9, 0), (10, 10), (60, 10), (61, 0)] {
            let b = score_article(&body, &seo(&"t".repeat(len), "", false), "");
            assert_eq!(b.title_points, expected, "title len {len}");
        }
        for (len, expected) in [(119, 0), (120, 10), (160, 10), (161, 0)] {
            let b = score_article(&body, &seo("", &"d".repeat(len), false), "");
            assert_eq!(b.description_points, expected, "description len {len}");
        }
    }

    #[test]
    fn partial_link_and_slot_credit() {
        let meta = seo("", "", false);
        let b = score_article(&body_with(10, 0, 0, 1, 1), &meta, "");
        assert_eq!(b.internal_link_points, 5);
        assert_eq!(b.affiliate_points, 2);

        let b = score_article(&body_with(10, 0, 0, 0, 0), &meta, "");
        assert_eq!(b.internal_link_points, 0);
        assert_eq!(b.affiliate_points, 0);
    }

    #[test]
    fn keyword_match_is_case_insensitive_and_text_only() {
        let meta = seo("", "", false);
        let body = "<p>Best Winter Boots for wet climates</p>";
        assert_eq!(score_article(body, &meta, "winter boots").keyword_points, 5);
        // keyword present only inside a tag attribute does not count
        let body = "<p data-k=\"winter boots\">nothing here</p>";
        assert_eq!(score_article(body, &meta, "winter boots").keyword_points, 0);
    }

    #[test]
    fn readability_averages_sentence_length() {
        let html = "<p>One two three. Four five six seven!</p>";
        let estimate = readability_estimate(html);
        assert!((estimate - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn readability_of_empty_body_is_zero() {
        assert!(readability_estimate("").abs() < f32::EPSILON);
    }

    #[test]
    fn strip_tags_replaces_markup_with_spaces() {
        assert_eq!(strip_tags("<p>a</p><p>b</p>").split_whitespace().count(), 2);
    }
}
