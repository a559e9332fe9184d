//! Database operations for the `pipeline_runs` table.
//!
//! One row per runner invocation: the structured run record (type,
//! trigger, status, duration) plus the ordered step log as JSONB.
//! Status transitions are conditional updates, mirroring the draft and
//! topic state machines.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, site_slug, run_type, trigger_source, status, \
     draft_id, steps, result_summary, error_message, \
     started_at, completed_at, created_at";

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub site_slug: String,
    pub run_type: String,
    pub trigger_source: String,
    pub status: String,
    pub draft_id: Option<i64>,
    pub steps: Option<Value>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Creates a new pipeline run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_pipeline_run(
    pool: &PgPool,
    site_slug: &str,
    run_type: &str,
    trigger_source: &str,
) -> Result<PipelineRunRow, DbError> {
    let sql = format!(
        "INSERT INTO pipeline_runs (public_id, site_slug, run_type, trigger_source) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PipelineRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(site_slug)
        .bind(run_type)
        .bind(trigger_source)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a run as `running`, records the driven draft, and stamps
/// `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_pipeline_run(
    pool: &PgPool,
    id: i64,
    draft_id: Option<i64>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'running', draft_id = COALESCE($2, draft_id), started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .bind(draft_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` with its step log and result summary.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_pipeline_run(
    pool: &PgPool,
    id: i64,
    steps: &Value,
    result_summary: &str,
) -> Result<(), DbError> {
    finish_run(pool, id, "succeeded", steps, Some(result_summary), None).await
}

/// Marks a run as `paused`: the budget expired mid-pipeline and the step
/// runner is expected to resume the draft later. Not an error outcome.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn pause_pipeline_run(
    pool: &PgPool,
    id: i64,
    steps: &Value,
    result_summary: &str,
) -> Result<(), DbError> {
    finish_run(pool, id, "paused", steps, Some(result_summary), None).await
}

// A run can fail before it ever starts (the draft open collided or
// errored while the row was still `queued`), so unlike success and
// pause this transition is valid from either pre-terminal status.
const FAIL_RUN_SQL: &str = "UPDATE pipeline_runs \
     SET status = 'failed', steps = $2, error_message = $3, \
         completed_at = NOW() \
     WHERE id = $1 AND status IN ('queued', 'running')";

/// Marks a run as `failed` with its step log and error message.
///
/// Valid from `queued` as well as `running`: a run that never got past
/// draft creation still leaves a failed record with its diagnosis.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_pipeline_run(
    pool: &PgPool,
    id: i64,
    steps: &Value,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(FAIL_RUN_SQL)
        .bind(id)
        .bind(steps)
        .bind(error_message)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued or running",
        });
    }

    Ok(())
}

async fn finish_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    steps: &Value,
    result_summary: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = $2, steps = $3, result_summary = $4, error_message = $5, \
             completed_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(status)
    .bind(steps)
    .bind(result_summary)
    .bind(error_message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a run by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_pipeline_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<PipelineRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM pipeline_runs WHERE public_id = $1");
    let row = sqlx::query_as::<_, PipelineRunRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, optionally filtered by site.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(
    pool: &PgPool,
    site_slug: Option<&str>,
    limit: i64,
) -> Result<Vec<PipelineRunRow>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM pipeline_runs \
         WHERE ($1::text IS NULL OR site_slug = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, PipelineRunRow>(&sql)
        .bind(site_slug)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
