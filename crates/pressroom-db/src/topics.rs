//! Database operations for the `topics` table.
//!
//! Topics are produced upstream and claimed here by runners. Claiming is
//! the only sanctioned way to take a topic: a conditional update that
//! succeeds iff the status still matches the expected pre-claim value, so
//! exactly one concurrent claimant wins.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const TOPIC_COLUMNS: &str =
    "id, public_id, site_slug, keyword, status, source, created_at, updated_at";

/// A row from the `topics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicRow {
    pub id: i64,
    pub public_id: Uuid,
    pub site_slug: String,
    pub keyword: String,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creates a topic in the given status (`proposed` for discovery intake,
/// `ready` for directly claimable seeds).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including the unique
/// `(site_slug, keyword)` collision when the topic already exists.
pub async fn create_topic(
    pool: &PgPool,
    site_slug: &str,
    keyword: &str,
    status: &str,
    source: &str,
) -> Result<TopicRow, DbError> {
    let sql = format!(
        "INSERT INTO topics (public_id, site_slug, keyword, status, source) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {TOPIC_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TopicRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(site_slug)
        .bind(keyword)
        .bind(status)
        .bind(source)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Compare-and-swap claim of one specific topic: `ready → generating`.
///
/// Returns `true` if this caller won the claim. `false` means another
/// runner already holds it (or it was never `ready`); the loser must
/// back off to other work, never create a duplicate draft.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_topic(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE topics \
         SET status = 'generating', updated_at = NOW() \
         WHERE id = $1 AND status = 'ready'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Claims the oldest `ready` topic for a site, if any.
///
/// Select-then-CAS: candidates are read without locks, then claimed with
/// [`claim_topic`]; a lost race just moves on to the next candidate.
/// Returns `None` when no claimable topic exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn claim_next_ready_topic(
    pool: &PgPool,
    site_slug: &str,
) -> Result<Option<TopicRow>, DbError> {
    let sql = format!(
        "SELECT {TOPIC_COLUMNS} FROM topics \
         WHERE site_slug = $1 AND status = 'ready' \
         ORDER BY created_at ASC, id ASC \
         LIMIT 5"
    );
    let candidates = sqlx::query_as::<_, TopicRow>(&sql)
        .bind(site_slug)
        .fetch_all(pool)
        .await?;

    for candidate in candidates {
        if claim_topic(pool, candidate.id).await? {
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Moves a claimed topic from `generating` to `generated` once its drafts
/// exist, with the same conditional-update guard.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_topic_generated(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE topics \
         SET status = 'generated', updated_at = NOW() \
         WHERE id = $1 AND status = 'generating'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Promotes a topic along the intake path (`proposed → queued → ready`).
///
/// Conditional on the expected current status; returns `false` on a
/// lost race or unexpected state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn promote_topic(
    pool: &PgPool,
    id: i64,
    expected_status: &str,
    next_status: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE topics \
         SET status = $3, updated_at = NOW() \
         WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(expected_status)
    .bind(next_status)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Lists topics for a site, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_topics(
    pool: &PgPool,
    site_slug: Option<&str>,
    limit: i64,
) -> Result<Vec<TopicRow>, DbError> {
    let sql = format!(
        "SELECT {TOPIC_COLUMNS} FROM topics \
         WHERE ($1::text IS NULL OR site_slug = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, TopicRow>(&sql)
        .bind(site_slug)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
