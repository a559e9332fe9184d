//! One module per pipeline phase, plus the dispatcher.
//!
//! Phase functions are pure with respect to the database: they read the
//! draft row they are handed and return a [`PhaseOutcome`]; persistence
//! and retry policy stay in the runners.

use serde::de::DeserializeOwned;
use serde_json::Value;

use pressroom_ai::TextGenerator;
use pressroom_core::SiteConfig;
use pressroom_db::DraftRow;

use crate::phase::{Phase, PhaseFailure, PhaseOutcome};

pub mod assembly;
pub mod drafting;
pub mod outline;
pub mod research;
pub mod scoring;
pub mod seo;

/// Everything a phase function may need besides the draft row itself.
pub struct PhaseContext<'a> {
    pub site: &'a SiteConfig,
    pub generator: &'a dyn TextGenerator,
    pub gate_threshold: i32,
}

/// Runs the phase the draft is currently in.
///
/// # Errors
///
/// Returns [`PhaseFailure`] if the stored phase string is unknown, the
/// draft is already terminal, or the phase itself fails.
pub async fn run_phase(
    draft: &DraftRow,
    ctx: &PhaseContext<'_>,
) -> Result<PhaseOutcome, PhaseFailure> {
    let phase: Phase = draft.phase.parse()?;
    match phase {
        Phase::Research => research::run(draft, ctx).await,
        Phase::Outline => outline::run(draft, ctx).await,
        Phase::Drafting => drafting::run(draft, ctx).await,
        Phase::Assembly => assembly::run(draft, ctx).await,
        Phase::Seo => seo::run(draft, ctx).await,
        Phase::Scoring => scoring::run(draft, ctx.gate_threshold),
        terminal => Err(PhaseFailure::new(format!(
            "draft {} is terminal in phase '{terminal}' and cannot be advanced",
            draft.public_id
        ))),
    }
}

/// Deserializes a stored JSONB payload a later phase depends on.
pub(crate) fn parse_stored<T: DeserializeOwned>(
    value: Option<&Value>,
    what: &str,
) -> Result<T, PhaseFailure> {
    let value = value.ok_or_else(|| {
        PhaseFailure::new(format!("draft is missing its {what} payload"))
    })?;
    serde_json::from_value(value.clone())
        .map_err(|e| PhaseFailure::new(format!("could not deserialize stored {what}: {e}")))
}

/// Deserializes a provider response into the phase's typed payload.
pub(crate) fn parse_response<T: DeserializeOwned>(
    value: Value,
    what: &str,
) -> Result<T, PhaseFailure> {
    serde_json::from_value(value)
        .map_err(|e| PhaseFailure::new(format!("could not deserialize {what} output: {e}")))
}

/// System prompt for the draft's locale; empty voice is a config error
/// caught at load time, but a missing locale entry degrades to nothing
/// rather than failing the phase.
pub(crate) fn voice(site: &SiteConfig, locale: &str) -> String {
    site.voice_for(locale).unwrap_or_default().to_string()
}
