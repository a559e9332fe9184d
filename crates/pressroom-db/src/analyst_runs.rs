//! Database operations for the `analyst_runs` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, site_slug, status, summary, grades, patterns, \
     recommendations, guidance, created_at, completed_at";

/// A row from the `analyst_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalystRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub site_slug: String,
    pub status: String,
    pub summary: Option<String>,
    pub grades: Option<Value>,
    pub patterns: Option<Value>,
    pub recommendations: Option<Value>,
    pub guidance: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creates an analyst run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_analyst_run(pool: &PgPool, site_slug: &str) -> Result<AnalystRunRow, DbError> {
    let sql = format!(
        "INSERT INTO analyst_runs (public_id, site_slug) \
         VALUES ($1, $2) \
         RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AnalystRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(site_slug)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Completes an analyst run with its full output payload.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_analyst_run(
    pool: &PgPool,
    id: i64,
    summary: &str,
    grades: &Value,
    patterns: &Value,
    recommendations: &Value,
    guidance: &Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analyst_runs \
         SET status = 'completed', summary = $2, grades = $3, patterns = $4, \
             recommendations = $5, guidance = $6, completed_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(summary)
    .bind(grades)
    .bind(patterns)
    .bind(recommendations)
    .bind(guidance)
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

/// Marks an analyst run as failed.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_analyst_run(pool: &PgPool, id: i64, summary: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analyst_runs \
         SET status = 'failed', summary = $2, completed_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(summary)
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

/// Feed-forward guidance from the most recent completed run for a site.
///
/// Absence of history is a valid outcome: returns `None`, never an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_guidance(pool: &PgPool, site_slug: &str) -> Result<Option<Value>, DbError> {
    let guidance = sqlx::query_scalar::<_, Option<Value>>(
        "SELECT guidance FROM analyst_runs \
         WHERE site_slug = $1 AND status = 'completed' AND guidance IS NOT NULL \
         ORDER BY completed_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(site_slug)
    .fetch_optional(pool)
    .await?;

    Ok(guidance.flatten())
}
