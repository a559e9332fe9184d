//! Step runner: one phase of one draft per invocation.
//!
//! Scheduled every minute and budgeted in seconds, the step runner is
//! what makes the pipeline resumable: any draft a long run left behind
//! gets carried forward a phase at a time. Cross-process exclusion is a
//! database lease, not an in-process guard.

use sqlx::PgPool;
use uuid::Uuid;

use pressroom_ai::TextGenerator;
use pressroom_core::{AppConfig, SitesFile};
use pressroom_db::{drafts, leases, topics, DraftRow, NewDraft};

use crate::budget::RunBudget;
use crate::phase::Phase;
use crate::phases::{run_phase, PhaseContext};
use crate::PipelineError;

/// Failed attempts a phase gets before the draft is force-rejected.
pub const MAX_PHASE_ATTEMPTS: i32 = 3;

pub const STEP_RUNNER_LEASE: &str = "step-runner";

/// What one step-runner invocation did.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Another process holds the step-runner lease.
    LeaseHeld,
    /// No resumable draft and no site under reservoir capacity.
    Idle,
    /// A phase ran and the draft advanced.
    Advanced {
        draft_id: i64,
        public_id: Uuid,
        from_phase: Phase,
        to_phase: Phase,
    },
    /// A phase failed; the draft keeps its phase and will retry.
    FailureRecorded {
        draft_id: i64,
        public_id: Uuid,
        phase: Phase,
        attempts: i32,
        error: String,
    },
    /// A phase failed at the attempt ceiling; the draft was rejected.
    Rejected {
        draft_id: i64,
        public_id: Uuid,
        reason: String,
    },
}

/// Sorts resumable candidates: furthest along the phase order first,
/// oldest-touched first within a phase. Unparseable phase strings sink
/// to the back instead of failing the runner.
#[must_use]
pub fn order_candidates(mut candidates: Vec<DraftRow>) -> Vec<DraftRow> {
    candidates.sort_by(|a, b| {
        let ord_a = a.phase.parse::<Phase>().map_or(0, Phase::order);
        let ord_b = b.phase.parse::<Phase>().map_or(0, Phase::order);
        ord_b
            .cmp(&ord_a)
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    });
    candidates
}

/// Runs one step: resume the best candidate draft, or create new work.
///
/// # Errors
///
/// Returns [`PipelineError`] on database failure. Phase failures are
/// not errors; they become [`StepOutcome::FailureRecorded`] or
/// [`StepOutcome::Rejected`].
pub async fn run_step(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &dyn TextGenerator,
    config: &AppConfig,
) -> Result<StepOutcome, PipelineError> {
    let holder = Uuid::new_v4();
    if !leases::acquire_lease(pool, STEP_RUNNER_LEASE, holder, config.step_budget_secs).await? {
        tracing::debug!("step-runner lease held elsewhere, skipping tick");
        return Ok(StepOutcome::LeaseHeld);
    }

    let outcome = run_step_inner(pool, sites, generator, config).await;

    if let Err(e) = leases::release_lease(pool, STEP_RUNNER_LEASE, holder).await {
        tracing::warn!(error = %e, "failed to release step-runner lease");
    }

    spawn_stalled_sweep(pool.clone());

    outcome
}

async fn run_step_inner(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &dyn TextGenerator,
    config: &AppConfig,
) -> Result<StepOutcome, PipelineError> {
    let budget = RunBudget::start(config.step_budget_secs);

    let slugs: Vec<String> = sites.sites.iter().map(pressroom_core::SiteConfig::slug).collect();
    let candidates = drafts::list_resumable_drafts(
        pool,
        &slugs,
        MAX_PHASE_ATTEMPTS,
        config.soft_lock_secs,
    )
    .await?;

    for candidate in order_candidates(candidates) {
        if !budget.allows(config.phase_safety_margin_secs) {
            tracing::info!("step budget exhausted before claiming a draft");
            return Ok(StepOutcome::Idle);
        }
        if !drafts::touch_draft(pool, candidate.id, config.soft_lock_secs).await? {
            continue;
        }
        let Some(site) = sites.by_slug(&candidate.site_slug) else {
            tracing::warn!(
                draft = %candidate.public_id,
                site = %candidate.site_slug,
                "draft references a site no longer in the registry"
            );
            continue;
        };
        return advance_one_phase(pool, &candidate, site, generator, config).await;
    }

    // Nothing to resume: open new work for the first site with headroom.
    for site in &sites.sites {
        let slug = site.slug();
        let reservoir = drafts::count_reservoir_drafts(pool, &slug).await?;
        if reservoir >= i64::from(site.reservoir_capacity()) {
            continue;
        }
        if !budget.allows(config.phase_safety_margin_secs) {
            return Ok(StepOutcome::Idle);
        }
        if let Some(draft) = open_new_draft(pool, site, &slug).await? {
            return advance_one_phase(pool, &draft, site, generator, config).await;
        }
    }

    Ok(StepOutcome::Idle)
}

/// Creates a draft (pair) from a claimed topic, falling back to the
/// site's deterministic day-of-year keyword template. Returns `None`
/// when no new work could be opened (e.g. today's template keyword was
/// already taken).
async fn open_new_draft(
    pool: &PgPool,
    site: &pressroom_core::SiteConfig,
    slug: &str,
) -> Result<Option<DraftRow>, PipelineError> {
    let (keyword, topic_id) = match topics::claim_next_ready_topic(pool, slug).await? {
        Some(topic) => (topic.keyword, Some(topic.id)),
        None => {
            let today = chrono::Utc::now().date_naive();
            let Some(keyword) = site.template_keyword(today) else {
                return Ok(None);
            };
            // Register the template keyword as a topic so the unique
            // (site, keyword) constraint dedupes concurrent fallbacks.
            match topics::create_topic(pool, slug, &keyword, "generating", "template").await {
                Ok(topic) => (topic.keyword, Some(topic.id)),
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!(site = slug, keyword, "template topic already exists");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let primary = NewDraft {
        site_slug: slug.to_string(),
        keyword: keyword.clone(),
        locale: site.primary_locale.clone(),
        topic_id,
    };
    let alternate = site.alternate_locale.as_ref().map(|locale| NewDraft {
        site_slug: slug.to_string(),
        keyword: keyword.clone(),
        locale: locale.clone(),
        topic_id,
    });

    let (draft, paired) = drafts::create_draft_pair(pool, &primary, alternate.as_ref()).await?;
    if let Some(topic_id) = topic_id {
        topics::mark_topic_generated(pool, topic_id).await?;
    }

    tracing::info!(
        draft = %draft.public_id,
        paired = paired.as_ref().map(|p| p.public_id.to_string()),
        site = slug,
        keyword,
        "opened new draft"
    );

    Ok(Some(draft))
}

/// Runs exactly one phase and persists the result, applying the retry
/// ceiling on failure.
pub(crate) async fn advance_one_phase(
    pool: &PgPool,
    draft: &DraftRow,
    site: &pressroom_core::SiteConfig,
    generator: &dyn TextGenerator,
    config: &AppConfig,
) -> Result<StepOutcome, PipelineError> {
    let from_phase: Phase = draft.phase.parse()?;
    let ctx = PhaseContext {
        site,
        generator,
        gate_threshold: config.gate_threshold,
    };

    match run_phase(draft, &ctx).await {
        Ok(outcome) => {
            let patch = outcome.output.to_patch();
            let updated = drafts::advance_draft_phase(
                pool,
                draft.id,
                from_phase.as_str(),
                outcome.next_phase.as_str(),
                &patch,
            )
            .await?;
            tracing::info!(
                draft = %updated.public_id,
                from = %from_phase,
                to = %outcome.next_phase,
                "phase complete"
            );
            Ok(StepOutcome::Advanced {
                draft_id: updated.id,
                public_id: updated.public_id,
                from_phase,
                to_phase: outcome.next_phase,
            })
        }
        Err(failure) => {
            let attempts = drafts::record_phase_failure(pool, draft.id, &failure.message).await?;
            if attempts >= MAX_PHASE_ATTEMPTS {
                let reason = format!(
                    "phase '{from_phase}' failed {attempts} attempts; last error: {}",
                    failure.message
                );
                drafts::reject_draft(pool, draft.id, &reason).await?;
                tracing::warn!(draft = %draft.public_id, %reason, "draft rejected");
                Ok(StepOutcome::Rejected {
                    draft_id: draft.id,
                    public_id: draft.public_id,
                    reason,
                })
            } else {
                tracing::warn!(
                    draft = %draft.public_id,
                    phase = %from_phase,
                    attempts,
                    error = %failure.message,
                    "phase failed, will retry"
                );
                Ok(StepOutcome::FailureRecorded {
                    draft_id: draft.id,
                    public_id: draft.public_id,
                    phase: from_phase,
                    attempts,
                    error: failure.message,
                })
            }
        }
    }
}

/// Fire-and-forget reconciliation of drafts stranded by crashed runs.
/// Never blocks the runner and never surfaces an error.
pub(crate) fn spawn_stalled_sweep(pool: PgPool) {
    tokio::spawn(async move {
        match drafts::release_stalled_drafts(&pool, MAX_PHASE_ATTEMPTS).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(swept = n, "rejected stalled drafts"),
            Err(e) => tracing::warn!(error = %e, "stalled-draft sweep failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::draft_in_phase;
    use chrono::{Duration, Utc};

    #[test]
    fn candidates_are_ordered_furthest_phase_first() {
        let mut research = draft_in_phase("research");
        research.id = 1;
        let mut seo = draft_in_phase("seo");
        seo.id = 2;
        let mut drafting = draft_in_phase("drafting");
        drafting.id = 3;

        let ordered = order_candidates(vec![research, seo, drafting]);
        let ids: Vec<i64> = ordered.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn ties_break_on_oldest_touch() {
        let now = Utc::now();
        let mut fresh = draft_in_phase("outline");
        fresh.id = 1;
        fresh.updated_at = now;
        let mut stale = draft_in_phase("outline");
        stale.id = 2;
        stale.updated_at = now - Duration::hours(3);

        let ordered = order_candidates(vec![fresh, stale]);
        assert_eq!(ordered[0].id, 2);
    }

    #[test]
    fn unknown_phase_sorts_last_without_panicking() {
        let mut weird = draft_in_phase("warp");
        weird.id = 1;
        let mut outline = draft_in_phase("outline");
        outline.id = 2;

        let ordered = order_candidates(vec![weird, outline]);
        assert_eq!(ordered[0].id, 2);
    }
}
