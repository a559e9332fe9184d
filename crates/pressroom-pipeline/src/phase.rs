//! The draft phase state machine and its typed per-phase payloads.
//!
//! Canonical order: `research → outline → drafting → assembly → seo →
//! scoring → {reservoir, rejected}`. Each phase function returns a
//! [`PhaseOutcome`] whose [`PhaseOutput`] variant carries only the data
//! that phase owns; the merge into the draft row applies nothing else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use pressroom_db::DraftPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Research,
    Outline,
    Drafting,
    Assembly,
    Seo,
    Scoring,
    Reservoir,
    Rejected,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Research,
        Phase::Outline,
        Phase::Drafting,
        Phase::Assembly,
        Phase::Seo,
        Phase::Scoring,
        Phase::Reservoir,
        Phase::Rejected,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Research => "research",
            Phase::Outline => "outline",
            Phase::Drafting => "drafting",
            Phase::Assembly => "assembly",
            Phase::Seo => "seo",
            Phase::Scoring => "scoring",
            Phase::Reservoir => "reservoir",
            Phase::Rejected => "rejected",
        }
    }

    /// Position in the canonical order; used by the step runner to
    /// prefer draining the furthest-along draft.
    #[must_use]
    pub fn order(self) -> u8 {
        match self {
            Phase::Research => 0,
            Phase::Outline => 1,
            Phase::Drafting => 2,
            Phase::Assembly => 3,
            Phase::Seo => 4,
            Phase::Scoring => 5,
            Phase::Reservoir => 6,
            Phase::Rejected => 7,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Reservoir | Phase::Rejected)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = PhaseFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(Phase::Research),
            "outline" => Ok(Phase::Outline),
            "drafting" => Ok(Phase::Drafting),
            "assembly" => Ok(Phase::Assembly),
            "seo" => Ok(Phase::Seo),
            "scoring" => Ok(Phase::Scoring),
            "reservoir" => Ok(Phase::Reservoir),
            "rejected" => Ok(Phase::Rejected),
            other => Err(PhaseFailure {
                message: format!("unknown phase '{other}'"),
            }),
        }
    }
}

/// A failed phase attempt. Carries only the error text; retry and
/// rejection policy belong to the runner, never to the phase itself.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PhaseFailure {
    pub message: String,
}

impl PhaseFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<pressroom_ai::AiError> for PhaseFailure {
    fn from(err: pressroom_ai::AiError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of one successful phase invocation.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub next_phase: Phase,
    pub output: PhaseOutput,
}

/// The partial state one phase produced, keyed by phase.
#[derive(Debug, Clone)]
pub enum PhaseOutput {
    Research {
        data: ResearchData,
    },
    Outline {
        outline: ArticleOutline,
    },
    /// One newly written section plus the full accumulated list.
    Section {
        sections: Vec<SectionDraft>,
        sections_completed: i32,
    },
    Assembly {
        body_html: String,
        body_html_alt: Option<String>,
    },
    Seo {
        seo: SeoMetadata,
    },
    Scoring {
        score: i32,
        readability: f32,
        rejection_reason: Option<String>,
    },
}

impl PhaseOutput {
    /// Convert into the column patch the merge step applies. Only the
    /// fields the producing phase owns are populated.
    #[must_use]
    pub fn to_patch(&self) -> DraftPatch {
        match self {
            PhaseOutput::Research { data } => DraftPatch {
                research: serde_json::to_value(data).ok(),
                ..DraftPatch::default()
            },
            PhaseOutput::Outline { outline } => DraftPatch {
                outline: serde_json::to_value(outline).ok(),
                sections_total: Some(i32::try_from(outline.sections.len()).unwrap_or(i32::MAX)),
                sections_completed: Some(0),
                ..DraftPatch::default()
            },
            PhaseOutput::Section {
                sections,
                sections_completed,
            } => DraftPatch {
                sections: serde_json::to_value(sections).ok(),
                sections_completed: Some(*sections_completed),
                ..DraftPatch::default()
            },
            PhaseOutput::Assembly {
                body_html,
                body_html_alt,
            } => DraftPatch {
                body_html: Some(body_html.clone()),
                body_html_alt: body_html_alt.clone(),
                ..DraftPatch::default()
            },
            PhaseOutput::Seo { seo } => DraftPatch {
                seo: serde_json::to_value(seo).ok(),
                ..DraftPatch::default()
            },
            PhaseOutput::Scoring {
                score,
                readability,
                rejection_reason,
            } => DraftPatch {
                score: Some(*score),
                readability: Some(*readability),
                rejection_reason: rejection_reason.clone(),
                ..DraftPatch::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

/// Structured research output: what the competition covers and what the
/// audience wants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchData {
    #[serde(default)]
    pub competitor_headings: Vec<String>,
    #[serde(default)]
    pub audience_intent: String,
    #[serde(default)]
    pub keyword_clusters: Vec<String>,
    #[serde(default = "default_word_count")]
    pub recommended_word_count: u32,
    #[serde(default = "default_heading_count")]
    pub recommended_heading_count: u32,
}

fn default_word_count() -> u32 {
    2000
}

fn default_heading_count() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    #[serde(default)]
    pub target_words: u32,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub link_opportunities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleOutline {
    pub title: String,
    #[serde(default)]
    pub title_alt: Option<String>,
    /// Opening the first section must lead with.
    #[serde(default)]
    pub hook: String,
    /// Close the last section must land on.
    #[serde(default)]
    pub call_to_action: String,
    pub sections: Vec<OutlineSection>,
    #[serde(default)]
    pub affiliate_plan: Vec<String>,
    #[serde(default)]
    pub internal_link_plan: Vec<String>,
    #[serde(default)]
    pub schema_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionDraft {
    pub heading: String,
    pub html: String,
    #[serde(default)]
    pub word_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoMetadata {
    #[serde(default)]
    pub title_tag: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub structured_data: Option<Value>,
    #[serde(default)]
    pub link_suggestions: Vec<String>,
    #[serde(default)]
    pub image_suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn phase_round_trips_through_strings() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_str(phase.as_str()).unwrap(), phase);
        }
    }

    #[test]
    fn unknown_phase_string_is_rejected() {
        assert!(Phase::from_str("published").is_err());
    }

    #[test]
    fn order_is_strictly_increasing_along_the_pipeline() {
        let orders: Vec<u8> = Phase::ALL.iter().map(|p| p.order()).collect();
        let mut sorted = orders.clone();
        sorted.sort_unstable();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn only_reservoir_and_rejected_are_terminal() {
        for phase in Phase::ALL {
            let expected = matches!(phase, Phase::Reservoir | Phase::Rejected);
            assert_eq!(phase.is_terminal(), expected, "phase {phase}");
        }
    }

    #[test]
    fn outline_patch_sets_section_counters() {
        let outline = ArticleOutline {
            title: "T".into(),
            sections: vec![OutlineSection::default(), OutlineSection::default()],
            ..ArticleOutline::default()
        };
        let patch = PhaseOutput::Outline { outline }.to_patch();
        assert_eq!(patch.sections_total, Some(2));
        assert_eq!(patch.sections_completed, Some(0));
        assert!(patch.outline.is_some());
        assert!(patch.body_html.is_none());
    }

    #[test]
    fn scoring_patch_only_touches_score_fields() {
        let patch = PhaseOutput::Scoring {
            score: 62,
            readability: 14.5,
            rejection_reason: None,
        }
        .to_patch();
        assert_eq!(patch.score, Some(62));
        assert!(patch.readability.is_some());
        assert!(patch.outline.is_none());
        assert!(patch.sections.is_none());
    }

    #[test]
    fn research_data_tolerates_sparse_json() {
        let data: ResearchData = serde_json::from_str("{}").unwrap();
        assert_eq!(data.recommended_word_count, 2000);
        assert_eq!(data.recommended_heading_count, 5);
        assert!(data.competitor_headings.is_empty());
    }
}
