//! Failure diagnoser.
//!
//! Pure translation of (failing phase, raw error text) into an
//! operator-facing explanation. Every error string the HTTP API or CLI
//! shows for a failed run goes through [`diagnose`]; raw provider and
//! database errors never leak out undigested.

use serde::Serialize;

use crate::phase::Phase;

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub summary: String,
    pub what: String,
    #[serde(rename = "where")]
    pub where_: String,
    pub why: String,
    pub fix: String,
    pub error_detail: String,
    pub completed_phases: Vec<String>,
}

struct RootCause {
    needles: &'static [&'static str],
    what: &'static str,
    why: &'static str,
    fix: &'static str,
}

// Ordered: first match wins. More specific causes come before broader
// transport-level ones (a rate-limit body often also mentions the
// connection, for example).
const ROOT_CAUSES: &[RootCause] = &[
    RootCause {
        needles: &["api key", "unauthorized", "401", "403"],
        what: "The AI provider rejected the request credentials",
        why: "The configured API key is missing, expired, or lacks access to the model",
        fix: "Set PRESSROOM_AI_API_KEY to a valid key for the configured provider",
    },
    RootCause {
        needles: &["rate limit", "429", "too many requests"],
        what: "The AI provider is rate limiting this account",
        why: "Request volume exceeded the provider's quota window",
        fix: "Wait for the quota window to reset, or raise PRESSROOM_AI_MAX_RETRIES",
    },
    RootCause {
        needles: &["could not deserialize", "expected value", "invalid json", "missing field"],
        what: "The AI provider returned output that does not match the expected structure",
        why: "The model ignored the JSON instructions or truncated mid-object",
        fix: "Retry the phase; if it persists, adjust the model or lower the temperature",
    },
    RootCause {
        needles: &["relation", "does not exist", "no such table"],
        what: "A required database table is missing",
        why: "Migrations have not been applied to this database",
        fix: "Run the migrations (they are embedded; restart the server or run any CLI command once)",
    },
    RootCause {
        needles: &["duplicate key", "unique constraint"],
        what: "An insert collided with an existing row",
        why: "The same site/keyword combination already has a topic or draft",
        fix: "Pick a different keyword, or let the existing draft finish",
    },
    RootCause {
        needles: &["connection refused", "connection reset", "pool timed out"],
        what: "A backing service refused the connection",
        why: "The database or AI endpoint is down or unreachable from this host",
        fix: "Check that the service is up and DATABASE_URL / base URLs are correct",
    },
    RootCause {
        needles: &["timed out", "timeout", "deadline"],
        what: "A request ran past its deadline",
        why: "The upstream service is overloaded or the configured timeout is too tight",
        fix: "Retry; if it recurs, raise PRESSROOM_AI_REQUEST_TIMEOUT_SECS",
    },
    RootCause {
        needles: &["dns", "network", "unreachable"],
        what: "A network-level failure interrupted the request",
        why: "Name resolution or routing to the upstream host failed",
        fix: "Check connectivity and the configured endpoint hostnames",
    },
    RootCause {
        needles: &["quality gate", "below threshold", "score"],
        what: "The finished article did not clear the quality gate",
        why: "The deterministic scorer found the article too thin or under-structured",
        fix: "Inspect the rejection reason; seed a stronger keyword or adjust thresholds",
    },
];

fn phase_fallback(phase: Phase) -> (&'static str, &'static str, &'static str) {
    match phase {
        Phase::Research => (
            "The research call failed",
            "The provider could not produce usable competitor/audience research",
            "Retry the step; the phase resumes from the beginning of research",
        ),
        Phase::Outline => (
            "Outline generation failed",
            "The provider could not turn the research into a structured outline",
            "Retry the step; research output is preserved",
        ),
        Phase::Drafting => (
            "A section draft failed",
            "The provider could not write the next section",
            "Retry the step; previously written sections are preserved",
        ),
        Phase::Assembly => (
            "Article assembly failed",
            "Sections could not be merged into a final body",
            "Retry the step; all drafted sections are preserved",
        ),
        Phase::Seo => (
            "SEO metadata generation failed",
            "The provider could not produce title/description metadata",
            "Retry the step; the assembled body is preserved",
        ),
        Phase::Scoring => (
            "Scoring failed",
            "The draft was missing the body or metadata the scorer requires",
            "Inspect the draft row; earlier phases may need to be re-run",
        ),
        Phase::Reservoir => (
            "A post-completion step failed",
            "The draft is finished but publication or indexing hit an error",
            "Retry promotion; the reservoir draft is intact",
        ),
        Phase::Rejected => (
            "An operation ran against a rejected draft",
            "Rejected drafts are terminal and cannot be advanced",
            "Create a new draft for this keyword instead",
        ),
    }
}

/// Builds an operator-facing diagnosis for a failure in `phase`.
#[must_use]
pub fn diagnose(phase: Phase, raw_error: &str) -> Diagnosis {
    let completed_phases: Vec<String> = Phase::ALL
        .iter()
        .filter(|p| !p.is_terminal() && p.order() < phase.order())
        .map(|p| p.to_string())
        .collect();

    let lower = raw_error.to_lowercase();
    let matched = ROOT_CAUSES
        .iter()
        .find(|cause| cause.needles.iter().any(|n| lower.contains(n)));

    let (what, why, fix) = match matched {
        Some(cause) => (
            cause.what.to_string(),
            cause.why.to_string(),
            cause.fix.to_string(),
        ),
        None => {
            let (what, why, fix) = phase_fallback(phase);
            (what.to_string(), why.to_string(), fix.to_string())
        }
    };

    Diagnosis {
        summary: format!("{what} during the {phase} phase"),
        what,
        where_: format!("{phase} phase"),
        why,
        fix,
        error_detail: raw_error.to_string(),
        completed_phases,
    }
}
