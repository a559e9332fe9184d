//! Pipeline command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Per-draft failures in batch commands are logged and
//! skipped rather than propagated so one bad draft does not abort the
//! run.

use sqlx::PgPool;
use uuid::Uuid;

use pressroom_ai::{ProviderChain, SearchClient};
use pressroom_core::{AppConfig, SitesFile};
use pressroom_pipeline::{
    FullRunDeps, FullRunOutcome, StagingPublisher, StepOutcome,
};

/// Drive one keyword through the full pipeline and print the step log.
///
/// # Errors
///
/// Returns an error if the site is unknown or the run cannot be
/// recorded. Phase failures do not error out; they surface as a
/// diagnosis in the printed report.
pub(crate) async fn run_generate(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &ProviderChain,
    config: &AppConfig,
    site: &str,
    keyword: Option<&str>,
) -> anyhow::Result<()> {
    let publisher = StagingPublisher;
    let deps = FullRunDeps {
        generator,
        publisher: &publisher,
        indexer: None,
    };

    let report =
        pressroom_pipeline::run_full(pool, sites, &deps, config, site, keyword, "cli").await?;

    println!("run {}", report.run_public_id);
    if let Some(draft) = report.draft_public_id {
        println!("draft {draft}");
    }
    for step in &report.steps {
        let mark = if step.success { "ok" } else { "FAIL" };
        println!("  [{mark}] {} ({} ms): {}", step.label, step.duration_ms, step.detail);
    }

    match report.outcome {
        FullRunOutcome::Completed { phase } => {
            println!("completed in phase '{phase}'");
        }
        FullRunOutcome::Paused { phase } => {
            println!("paused in phase '{phase}'; re-run to resume");
        }
        FullRunOutcome::Failed { diagnosis } => {
            println!("failed: {}", diagnosis.summary);
            println!("  what:  {}", diagnosis.what);
            println!("  where: {}", diagnosis.where_);
            println!("  why:   {}", diagnosis.why);
            println!("  fix:   {}", diagnosis.fix);
        }
    }

    Ok(())
}

/// One scheduler-style tick: claim the lease, advance one draft one phase.
pub(crate) async fn run_step(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &ProviderChain,
    config: &AppConfig,
) -> anyhow::Result<()> {
    match pressroom_pipeline::run_step(pool, sites, generator, config).await? {
        StepOutcome::LeaseHeld => println!("another runner holds the step lease; nothing done"),
        StepOutcome::Idle => println!("no claimable work"),
        StepOutcome::Advanced {
            public_id,
            from_phase,
            to_phase,
            ..
        } => println!("advanced draft {public_id}: {from_phase} -> {to_phase}"),
        StepOutcome::FailureRecorded {
            public_id,
            attempts,
            error,
            ..
        } => println!("draft {public_id} failed (attempt {attempts}): {error}"),
        StepOutcome::Rejected { public_id, reason, .. } => {
            println!("draft {public_id} rejected: {reason}");
        }
    }

    Ok(())
}

/// Enhance one named draft, or the marginal-reservoir batch.
pub(crate) async fn run_enhance(
    pool: &PgPool,
    sites: &SitesFile,
    generator: &ProviderChain,
    search: Option<&SearchClient>,
    config: &AppConfig,
    draft: Option<Uuid>,
    limit: i64,
) -> anyhow::Result<()> {
    let reports = match draft {
        Some(public_id) => {
            vec![
                pressroom_pipeline::enhance_draft(pool, sites, generator, search, config, public_id)
                    .await?,
            ]
        }
        None => {
            pressroom_pipeline::run_enhancement(pool, sites, generator, search, config, limit)
                .await?
        }
    };

    if reports.is_empty() {
        println!("no marginal reservoir drafts to enhance");
        return Ok(());
    }

    for report in &reports {
        let verdict = if report.promoted { "promoted" } else { "kept" };
        println!(
            "draft {}: {} -> {} ({verdict}); weaknesses: [{}]",
            report.public_id,
            report.old_score,
            report.new_score,
            report.weaknesses.join(", ")
        );
    }

    Ok(())
}
