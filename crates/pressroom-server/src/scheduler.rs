//! Background job scheduler.
//!
//! Registers the recurring step-runner tick and the nightly analyst run.
//! Job failures are logged and the schedule keeps going; a tick never
//! takes the process down.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use pressroom_ai::ProviderChain;
use pressroom_core::{AppConfig, SitesFile};
use pressroom_pipeline::StepOutcome;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all scheduled
/// jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised
/// or started.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    sites: Arc<SitesFile>,
    generator: Arc<ProviderChain>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_step_job(
        &scheduler,
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&sites),
        Arc::clone(&generator),
    )
    .await?;
    register_analyst_job(&scheduler, pool, sites, generator).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Registers the per-minute pipeline tick.
///
/// Runs every minute on the minute by default (`0 * * * * *`) and can be
/// overridden with `STEP_RUNNER_CRON`.
async fn register_step_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    sites: Arc<SitesFile>,
    generator: Arc<ProviderChain>,
) -> Result<(), JobSchedulerError> {
    let cron = std::env::var("STEP_RUNNER_CRON").unwrap_or_else(|_| "0 * * * * *".to_string());
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let sites = Arc::clone(&sites);
        let generator = Arc::clone(&generator);

        Box::pin(async move {
            match pressroom_pipeline::run_step(&pool, &sites, generator.as_ref(), &config).await {
                Ok(StepOutcome::LeaseHeld) => {
                    tracing::debug!("scheduler: step tick skipped, lease held elsewhere");
                }
                Ok(StepOutcome::Idle) => {
                    tracing::debug!("scheduler: step tick found no work");
                }
                Ok(outcome) => {
                    tracing::info!(outcome = ?outcome, "scheduler: step tick advanced work");
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: step tick failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered step-runner job");
    Ok(())
}

/// Registers the nightly analyst run.
///
/// Runs at 03:00 UTC by default (`0 0 3 * * *`) and can be overridden
/// with `ANALYST_CRON`. Each configured site is analysed in turn; one
/// site's failure does not block the rest.
async fn register_analyst_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    sites: Arc<SitesFile>,
    generator: Arc<ProviderChain>,
) -> Result<(), JobSchedulerError> {
    let cron = std::env::var("ANALYST_CRON").unwrap_or_else(|_| "0 0 3 * * *".to_string());
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let sites = Arc::clone(&sites);
        let generator = Arc::clone(&generator);

        Box::pin(async move {
            tracing::info!("scheduler: starting nightly analyst run");
            for site in &sites.sites {
                let slug = site.slug();
                match pressroom_analyst::run_analysis(&pool, Some(generator.as_ref()), &slug, None)
                    .await
                {
                    Ok(report) => {
                        tracing::info!(
                            site = %slug,
                            run_public_id = %report.run_public_id,
                            graded = report.graded,
                            "scheduler: analyst run complete"
                        );
                    }
                    Err(e) => {
                        tracing::error!(site = %slug, error = %e, "scheduler: analyst run failed");
                    }
                }
            }
            tracing::info!("scheduler: nightly analyst run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered analyst job");
    Ok(())
}
