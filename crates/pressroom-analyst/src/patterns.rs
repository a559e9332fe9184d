//! Optional AI pattern augmentation.
//!
//! The provider is asked to name avoid/double-down patterns and rank
//! recommendations on top of the data-only aggregates. Its response is
//! validated for shape and silently discarded when malformed; analysis
//! never fails because the commentary layer did.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pressroom_ai::{GenerationRequest, TextGenerator};

use crate::aggregate::Aggregates;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    #[serde(default)]
    pub commentary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet {
    pub avoid: Vec<Pattern>,
    pub double_down: Vec<Pattern>,
    /// Ranked, most important first.
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub audience_notes: String,
}

/// Shape validation: both pattern lists present with named entries, at
/// least one recommendation. Returns `None` for anything else.
#[must_use]
pub fn validate_patterns(value: &Value) -> Option<PatternSet> {
    let set: PatternSet = serde_json::from_value(value.clone()).ok()?;
    if set.recommendations.is_empty() {
        return None;
    }
    let named = |patterns: &[Pattern]| patterns.iter().all(|p| !p.name.trim().is_empty());
    if !named(&set.avoid) || !named(&set.double_down) {
        return None;
    }
    Some(set)
}

/// Asks the provider for patterns over the graded rows. Any failure
/// (transport, malformed JSON, wrong shape) degrades to `None`.
pub async fn propose_patterns(
    generator: &dyn TextGenerator,
    site_name: &str,
    aggregates: &Aggregates,
    graded: &Value,
) -> Option<PatternSet> {
    let prompt = format!(
        "You are reviewing content performance for \"{site_name}\".\n\
         Data-derived aggregates:\n{aggregates}\n\n\
         Graded rows:\n{graded}\n\n\
         Respond with a single JSON object:\n\
         - \"avoid\": array of {{\"name\", \"commentary\"}} patterns that \
           underperform\n\
         - \"double_down\": array of {{\"name\", \"commentary\"}} patterns \
           that outperform\n\
         - \"recommendations\": ranked array of strings, most important \
           first\n\
         - \"audience_notes\": one paragraph on what the audience responds \
           to",
        aggregates = serde_json::to_string(aggregates).unwrap_or_default(),
    );
    let request = GenerationRequest::new(String::new(), prompt).with_temperature(0.3);

    match generator.generate_structured(&request).await {
        Ok(value) => {
            let validated = validate_patterns(&value);
            if validated.is_none() {
                tracing::warn!(site = site_name, "pattern response malformed, discarded");
            }
            validated
        }
        Err(e) => {
            tracing::warn!(site = site_name, error = %e, "pattern augmentation unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_patterns_validate() {
        let value = json!({
            "avoid": [{ "name": "late-night posts", "commentary": "low reach" }],
            "double_down": [{ "name": "morning newsletters" }],
            "recommendations": ["shift posting to mornings"],
            "audience_notes": "prefers practical guides"
        });
        let set = validate_patterns(&value).unwrap();
        assert_eq!(set.avoid.len(), 1);
        assert_eq!(set.recommendations.len(), 1);
    }

    #[test]
    fn missing_recommendations_are_discarded() {
        let value = json!({
            "avoid": [],
            "double_down": [],
            "recommendations": []
        });
        assert!(validate_patterns(&value).is_none());
    }

    #[test]
    fn unnamed_patterns_are_discarded() {
        let value = json!({
            "avoid": [{ "name": "  " }],
            "double_down": [],
            "recommendations": ["x"]
        });
        assert!(validate_patterns(&value).is_none());
    }

    #[test]
    fn wrong_shape_is_discarded() {
        assert!(validate_patterns(&json!("not an object")).is_none());
        assert!(validate_patterns(&json!({ "avoid": "nope" })).is_none());
    }
}
