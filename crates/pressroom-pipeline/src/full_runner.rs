//! Full-run runner: drive one draft from creation toward a terminal
//! phase inside a single, budgeted invocation.
//!
//! The loop re-reads the draft each iteration so it always acts on the
//! persisted state, and every iteration appends to an ordered step log
//! that is stored on the `pipeline_runs` row whatever the outcome.
//! Running out of budget is a pause, not a failure: the scheduled step
//! runner finishes the draft later.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use pressroom_ai::{IndexingClient, IndexingStatus, TextGenerator};
use pressroom_core::{AppConfig, SitesFile};
use pressroom_db::{drafts, pipeline_runs, topics, NewDraft};

use crate::budget::RunBudget;
use crate::diagnose::{diagnose, Diagnosis};
use crate::phase::Phase;
use crate::publish::Publisher;
use crate::step_runner::{advance_one_phase, StepOutcome, MAX_PHASE_ATTEMPTS};
use crate::PipelineError;

/// One entry in the ordered step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub label: String,
    pub phase: String,
    pub success: bool,
    pub detail: String,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub enum FullRunOutcome {
    /// The draft reached a terminal phase (reservoir, or rejected by
    /// the quality gate).
    Completed { phase: Phase },
    /// The wall-clock budget ran out; the step runner resumes later.
    Paused { phase: Phase },
    /// The pipeline could not finish the draft.
    Failed { diagnosis: Diagnosis },
}

#[derive(Debug)]
pub struct FullRunReport {
    pub outcome: FullRunOutcome,
    pub steps: Vec<RunStep>,
    pub run_public_id: Uuid,
    pub draft_public_id: Option<Uuid>,
}

/// Everything the full runner drives besides the database.
pub struct FullRunDeps<'a> {
    pub generator: &'a dyn TextGenerator,
    pub publisher: &'a dyn Publisher,
    pub indexer: Option<&'a IndexingClient>,
}

/// Runs the whole pipeline for one draft.
///
/// With `keyword` given, a fresh topic/draft pair is created for it;
/// otherwise a `ready` topic is claimed, falling back to the site's
/// keyword template.
///
/// # Errors
///
/// Returns [`PipelineError`] only for failures before a run row exists
/// (unknown site, run-row insert). Everything after that is reported
/// through [`FullRunOutcome`] so the step log is never lost.
pub async fn run_full(
    pool: &PgPool,
    sites: &SitesFile,
    deps: &FullRunDeps<'_>,
    config: &AppConfig,
    site_slug: &str,
    keyword: Option<&str>,
    trigger_source: &str,
) -> Result<FullRunReport, PipelineError> {
    let site = sites
        .by_slug(site_slug)
        .ok_or_else(|| PipelineError::UnknownSite(site_slug.to_string()))?;

    let run = pipeline_runs::create_pipeline_run(pool, site_slug, "full", trigger_source).await?;
    let budget = RunBudget::start(config.full_run_budget_secs);
    let mut steps: Vec<RunStep> = Vec::new();

    let draft = match open_draft(pool, site, site_slug, keyword).await {
        Ok(Some(draft)) => draft,
        Ok(None) => {
            let diagnosis = diagnose(
                Phase::Research,
                "duplicate key: a draft for this keyword already exists",
            );
            finish_failed(pool, run.id, &steps, &diagnosis).await;
            return Ok(FullRunReport {
                outcome: FullRunOutcome::Failed { diagnosis },
                steps,
                run_public_id: run.public_id,
                draft_public_id: None,
            });
        }
        Err(e) => {
            let diagnosis = diagnose(Phase::Research, &e.to_string());
            finish_failed(pool, run.id, &steps, &diagnosis).await;
            return Ok(FullRunReport {
                outcome: FullRunOutcome::Failed { diagnosis },
                steps,
                run_public_id: run.public_id,
                draft_public_id: None,
            });
        }
    };

    if let Err(e) = pipeline_runs::start_pipeline_run(pool, run.id, Some(draft.id)).await {
        tracing::warn!(error = %e, "could not mark run as running");
    }

    let draft_public_id = draft.public_id;
    let draft_id = draft.id;

    // Phase loop: always act on freshly read state. The last phase the
    // loop saw labels any re-read or parse failure, so the diagnosis
    // names where the draft actually was, not where it started.
    let mut last_phase = Phase::Research;
    let final_phase = loop {
        let current = match drafts::get_draft(pool, draft_id).await {
            Ok(row) => row,
            Err(e) => {
                let diagnosis = diagnose(last_phase, &e.to_string());
                finish_failed(pool, run.id, &steps, &diagnosis).await;
                return Ok(FullRunReport {
                    outcome: FullRunOutcome::Failed { diagnosis },
                    steps,
                    run_public_id: run.public_id,
                    draft_public_id: Some(draft_public_id),
                });
            }
        };

        let phase: Phase = match current.phase.parse() {
            Ok(p) => p,
            Err(failure) => {
                let diagnosis = diagnose(last_phase, &failure.message);
                finish_failed(pool, run.id, &steps, &diagnosis).await;
                return Ok(FullRunReport {
                    outcome: FullRunOutcome::Failed { diagnosis },
                    steps,
                    run_public_id: run.public_id,
                    draft_public_id: Some(draft_public_id),
                });
            }
        };

        last_phase = phase;

        if phase.is_terminal() {
            break phase;
        }

        if !budget.allows(config.phase_safety_margin_secs) {
            let summary = format!("budget exhausted in phase '{phase}'");
            finish_paused(pool, run.id, &steps, &summary).await;
            return Ok(FullRunReport {
                outcome: FullRunOutcome::Paused { phase },
                steps,
                run_public_id: run.public_id,
                draft_public_id: Some(draft_public_id),
            });
        }

        let started = Instant::now();
        let result = advance_one_phase(pool, &current, site, deps.generator, config).await;
        let duration_ms = duration_ms(started);

        match result {
            Ok(StepOutcome::Advanced {
                from_phase,
                to_phase,
                ..
            }) => {
                steps.push(RunStep {
                    label: format!("phase {from_phase}"),
                    phase: from_phase.to_string(),
                    success: true,
                    detail: format!("advanced to '{to_phase}'"),
                    duration_ms,
                });
            }
            Ok(StepOutcome::FailureRecorded {
                phase,
                attempts,
                error,
                ..
            }) => {
                steps.push(RunStep {
                    label: format!("phase {phase}"),
                    phase: phase.to_string(),
                    success: false,
                    detail: format!(
                        "attempt {attempts}/{MAX_PHASE_ATTEMPTS} failed: {error}"
                    ),
                    duration_ms,
                });
            }
            Ok(StepOutcome::Rejected { reason, .. }) => {
                steps.push(RunStep {
                    label: format!("phase {phase}"),
                    phase: phase.to_string(),
                    success: false,
                    detail: reason.clone(),
                    duration_ms,
                });
                let diagnosis = diagnose(phase, &reason);
                finish_failed(pool, run.id, &steps, &diagnosis).await;
                return Ok(FullRunReport {
                    outcome: FullRunOutcome::Failed { diagnosis },
                    steps,
                    run_public_id: run.public_id,
                    draft_public_id: Some(draft_public_id),
                });
            }
            Ok(StepOutcome::LeaseHeld | StepOutcome::Idle) => {
                // advance_one_phase never returns these variants
            }
            Err(e) => {
                steps.push(RunStep {
                    label: format!("phase {phase}"),
                    phase: phase.to_string(),
                    success: false,
                    detail: e.to_string(),
                    duration_ms,
                });
                let diagnosis = diagnose(phase, &e.to_string());
                finish_failed(pool, run.id, &steps, &diagnosis).await;
                return Ok(FullRunReport {
                    outcome: FullRunOutcome::Failed { diagnosis },
                    steps,
                    run_public_id: run.public_id,
                    draft_public_id: Some(draft_public_id),
                });
            }
        }
    };

    if final_phase == Phase::Reservoir && budget.allows(config.phase_safety_margin_secs) {
        promote(pool, deps, site, draft_id, &mut steps).await;
    }

    if budget.allows(config.phase_safety_margin_secs) {
        match drafts::release_stalled_drafts(pool, MAX_PHASE_ATTEMPTS).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(swept = n, "rejected stalled drafts"),
            Err(e) => tracing::warn!(error = %e, "stalled-draft sweep failed"),
        }
    }

    let summary = format!("draft finished in phase '{final_phase}'");
    finish_completed(pool, run.id, &steps, &summary).await;

    Ok(FullRunReport {
        outcome: FullRunOutcome::Completed { phase: final_phase },
        steps,
        run_public_id: run.public_id,
        draft_public_id: Some(draft_public_id),
    })
}

/// Creates the draft (pair) a full run will drive. `None` means the
/// keyword collided with an existing topic.
async fn open_draft(
    pool: &PgPool,
    site: &pressroom_core::SiteConfig,
    site_slug: &str,
    keyword: Option<&str>,
) -> Result<Option<pressroom_db::DraftRow>, PipelineError> {
    let (keyword, topic_id) = match keyword {
        Some(keyword) => {
            match topics::create_topic(pool, site_slug, keyword, "generating", "request").await {
                Ok(topic) => (topic.keyword, Some(topic.id)),
                Err(e) if e.is_unique_violation() => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        None => match topics::claim_next_ready_topic(pool, site_slug).await? {
            Some(topic) => (topic.keyword, Some(topic.id)),
            None => {
                let today = chrono::Utc::now().date_naive();
                let Some(keyword) = site.template_keyword(today) else {
                    return Ok(None);
                };
                match topics::create_topic(pool, site_slug, &keyword, "generating", "template")
                    .await
                {
                    Ok(topic) => (topic.keyword, Some(topic.id)),
                    Err(e) if e.is_unique_violation() => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            }
        },
    };

    let primary = NewDraft {
        site_slug: site_slug.to_string(),
        keyword: keyword.clone(),
        locale: site.primary_locale.clone(),
        topic_id,
    };
    let alternate = site.alternate_locale.as_ref().map(|locale| NewDraft {
        site_slug: site_slug.to_string(),
        keyword: keyword.clone(),
        locale: locale.clone(),
        topic_id,
    });

    let (draft, _paired) = drafts::create_draft_pair(pool, &primary, alternate.as_ref()).await?;
    if let Some(topic_id) = topic_id {
        topics::mark_topic_generated(pool, topic_id).await?;
    }

    Ok(Some(draft))
}

/// Publication + indexing after a reservoir finish. Both best-effort:
/// failures are logged as steps, never propagated.
async fn promote(
    pool: &PgPool,
    deps: &FullRunDeps<'_>,
    site: &pressroom_core::SiteConfig,
    draft_id: i64,
    steps: &mut Vec<RunStep>,
) {
    let draft = match drafts::get_draft(pool, draft_id).await {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!(error = %e, "could not re-read draft for promotion");
            return;
        }
    };

    let started = Instant::now();
    match deps.publisher.publish(site, &draft).await {
        Ok(published) => {
            steps.push(RunStep {
                label: "promotion".to_string(),
                phase: Phase::Reservoir.to_string(),
                success: true,
                detail: format!("published to {}", published.url),
                duration_ms: duration_ms(started),
            });

            if let Some(indexer) = deps.indexer {
                let started = Instant::now();
                let (success, detail) = match indexer.submit(&published.url).await {
                    Ok(IndexingStatus::Accepted) => (true, "indexing accepted".to_string()),
                    Ok(IndexingStatus::Rejected(reason)) => {
                        (false, format!("indexing rejected: {reason}"))
                    }
                    Err(e) => (false, format!("indexing submission failed: {e}")),
                };
                if !success {
                    tracing::warn!(url = %published.url, detail, "indexing did not succeed");
                }
                steps.push(RunStep {
                    label: "indexing".to_string(),
                    phase: Phase::Reservoir.to_string(),
                    success,
                    detail,
                    duration_ms: duration_ms(started),
                });
            }
        }
        Err(e) => {
            tracing::warn!(draft = %draft.public_id, error = %e, "promotion failed");
            steps.push(RunStep {
                label: "promotion".to_string(),
                phase: Phase::Reservoir.to_string(),
                success: false,
                detail: e.to_string(),
                duration_ms: duration_ms(started),
            });
        }
    }
}

fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn steps_json(steps: &[RunStep]) -> serde_json::Value {
    serde_json::to_value(steps).unwrap_or(serde_json::Value::Null)
}

async fn finish_completed(pool: &PgPool, run_id: i64, steps: &[RunStep], summary: &str) {
    if let Err(e) =
        pipeline_runs::complete_pipeline_run(pool, run_id, &steps_json(steps), summary).await
    {
        tracing::warn!(run_id, error = %e, "could not mark run completed");
    }
}

async fn finish_paused(pool: &PgPool, run_id: i64, steps: &[RunStep], summary: &str) {
    if let Err(e) =
        pipeline_runs::pause_pipeline_run(pool, run_id, &steps_json(steps), summary).await
    {
        tracing::warn!(run_id, error = %e, "could not mark run paused");
    }
}

async fn finish_failed(pool: &PgPool, run_id: i64, steps: &[RunStep], diagnosis: &Diagnosis) {
    if let Err(e) =
        pipeline_runs::fail_pipeline_run(pool, run_id, &steps_json(steps), &diagnosis.summary)
            .await
    {
        tracing::warn!(run_id, error = %e, "could not mark run failed");
    }
}
