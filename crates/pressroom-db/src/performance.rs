//! Database operations for the `performance_records` table.
//!
//! One row per published-content distribution channel. The engagement
//! rate is computed at insert time in Rust (zero when impressions are
//! zero); grades are assigned later by the analyst.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const RECORD_COLUMNS: &str = "id, site_slug, pipeline_run_id, channel, format, posted_at, \
     impressions, engagements, engagement_rate, grade, created_at";

/// A row from the `performance_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PerformanceRecordRow {
    pub id: i64,
    pub site_slug: String,
    pub pipeline_run_id: Option<i64>,
    pub channel: String,
    pub format: String,
    pub posted_at: DateTime<Utc>,
    pub impressions: i64,
    pub engagements: i64,
    pub engagement_rate: f32,
    pub grade: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for performance telemetry ingest.
#[derive(Debug, Clone)]
pub struct NewPerformanceRecord {
    pub site_slug: String,
    pub pipeline_run_id: Option<i64>,
    pub channel: String,
    pub format: String,
    pub posted_at: DateTime<Utc>,
    pub impressions: i64,
    pub engagements: i64,
}

impl NewPerformanceRecord {
    /// Engagement rate with the zero-impressions guard.
    #[must_use]
    pub fn engagement_rate(&self) -> f32 {
        if self.impressions <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.engagements as f32 / self.impressions as f32;
        rate
    }
}

/// Inserts one telemetry row, computing the engagement rate.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_performance_record(
    pool: &PgPool,
    record: &NewPerformanceRecord,
) -> Result<PerformanceRecordRow, DbError> {
    let sql = format!(
        "INSERT INTO performance_records \
             (site_slug, pipeline_run_id, channel, format, posted_at, \
              impressions, engagements, engagement_rate) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {RECORD_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PerformanceRecordRow>(&sql)
        .bind(&record.site_slug)
        .bind(record.pipeline_run_id)
        .bind(&record.channel)
        .bind(&record.format)
        .bind(record.posted_at)
        .bind(record.impressions)
        .bind(record.engagements)
        .bind(record.engagement_rate())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Returns the rows attributed to one pipeline run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_run_performance(
    pool: &PgPool,
    pipeline_run_id: i64,
) -> Result<Vec<PerformanceRecordRow>, DbError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM performance_records \
         WHERE pipeline_run_id = $1 \
         ORDER BY posted_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, PerformanceRecordRow>(&sql)
        .bind(pipeline_run_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns up to `limit` historical rows for a site, newest first.
///
/// This is the bounded window the analyst grades against.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_performance_history(
    pool: &PgPool,
    site_slug: &str,
    limit: i64,
) -> Result<Vec<PerformanceRecordRow>, DbError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM performance_records \
         WHERE site_slug = $1 \
         ORDER BY posted_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, PerformanceRecordRow>(&sql)
        .bind(site_slug)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Stores the analyst-assigned letter grade for one row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the row does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn grade_performance_record(pool: &PgPool, id: i64, grade: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE performance_records SET grade = $2 WHERE id = $1")
        .bind(id)
        .bind(grade)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(impressions: i64, engagements: i64) -> NewPerformanceRecord {
        NewPerformanceRecord {
            site_slug: "coastal-escapes".to_string(),
            pipeline_run_id: None,
            channel: "newsletter".to_string(),
            format: "listicle".to_string(),
            posted_at: Utc::now(),
            impressions,
            engagements,
        }
    }

    #[test]
    fn engagement_rate_zero_impressions_is_zero() {
        assert_eq!(record(0, 50).engagement_rate(), 0.0);
    }

    #[test]
    fn engagement_rate_negative_impressions_is_zero() {
        assert_eq!(record(-5, 50).engagement_rate(), 0.0);
    }

    #[test]
    fn engagement_rate_computes_ratio() {
        let rate = record(1000, 50).engagement_rate();
        assert!((rate - 0.05).abs() < f32::EPSILON);
    }
}
