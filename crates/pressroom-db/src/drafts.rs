//! Database operations for the `drafts` table.
//!
//! Drafts are mutated exclusively through the operations here: phase
//! advancement is a conditional update on the current phase, failure
//! bookkeeping increments the attempt counter, and terminal rows are
//! retained for audit and for the analyst, never deleted.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const DRAFT_COLUMNS: &str = "id, public_id, site_slug, keyword, locale, phase, \
     sections_total, sections_completed, research, outline, sections, \
     body_html, body_html_alt, seo, score, readability, phase_attempts, \
     last_error, rejection_reason, paired_draft_id, topic_id, \
     created_at, updated_at, phase_started_at, completed_at";

/// A row from the `drafts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DraftRow {
    pub id: i64,
    pub public_id: Uuid,
    pub site_slug: String,
    pub keyword: String,
    pub locale: String,
    pub phase: String,
    pub sections_total: i32,
    pub sections_completed: i32,
    pub research: Option<Value>,
    pub outline: Option<Value>,
    pub sections: Option<Value>,
    pub body_html: Option<String>,
    pub body_html_alt: Option<String>,
    pub seo: Option<Value>,
    pub score: Option<i32>,
    pub readability: Option<f32>,
    pub phase_attempts: i32,
    pub last_error: Option<String>,
    pub rejection_reason: Option<String>,
    pub paired_draft_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub phase_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for draft creation.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub site_slug: String,
    pub keyword: String,
    pub locale: String,
    pub topic_id: Option<i64>,
}

/// Partial state produced by one phase, merged into the draft on success.
///
/// Only the fields a phase actually owns are `Some`; everything else is
/// left untouched by the merge (`COALESCE` against the existing column).
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub sections_total: Option<i32>,
    pub sections_completed: Option<i32>,
    pub research: Option<Value>,
    pub outline: Option<Value>,
    pub sections: Option<Value>,
    pub body_html: Option<String>,
    pub body_html_alt: Option<String>,
    pub seo: Option<Value>,
    pub score: Option<i32>,
    pub readability: Option<f32>,
    pub rejection_reason: Option<String>,
}

/// Creates a draft in phase `research`, optionally paired with an
/// alternate-locale twin. The two rows link to each other through
/// `paired_draft_id`; both link back to the originating topic.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert or the pairing update fails.
pub async fn create_draft_pair(
    pool: &PgPool,
    primary: &NewDraft,
    alternate: Option<&NewDraft>,
) -> Result<(DraftRow, Option<DraftRow>), DbError> {
    let mut tx = pool.begin().await?;

    let insert_sql = format!(
        "INSERT INTO drafts (public_id, site_slug, keyword, locale, topic_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {DRAFT_COLUMNS}"
    );

    let primary_row = sqlx::query_as::<_, DraftRow>(&insert_sql)
        .bind(Uuid::new_v4())
        .bind(&primary.site_slug)
        .bind(&primary.keyword)
        .bind(&primary.locale)
        .bind(primary.topic_id)
        .fetch_one(&mut *tx)
        .await?;

    let alternate_row = if let Some(alt) = alternate {
        let insert_paired_sql = format!(
            "INSERT INTO drafts (public_id, site_slug, keyword, locale, topic_id, paired_draft_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {DRAFT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DraftRow>(&insert_paired_sql)
            .bind(Uuid::new_v4())
            .bind(&alt.site_slug)
            .bind(&alt.keyword)
            .bind(&alt.locale)
            .bind(alt.topic_id)
            .bind(primary_row.id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE drafts SET paired_draft_id = $1 WHERE id = $2")
            .bind(row.id)
            .bind(primary_row.id)
            .execute(&mut *tx)
            .await?;

        Some(row)
    } else {
        None
    };

    tx.commit().await?;

    Ok((primary_row, alternate_row))
}

/// Fetches a single draft by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_draft(pool: &PgPool, id: i64) -> Result<DraftRow, DbError> {
    let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = $1");
    let row = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a single draft by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_draft_by_public_id(pool: &PgPool, public_id: Uuid) -> Result<DraftRow, DbError> {
    let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE public_id = $1");
    let row = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Lists non-terminal drafts eligible for another phase step.
///
/// A draft qualifies when its attempt counter is below the ceiling and it
/// has not been touched within the soft-lock window. The window keeps two
/// runner instances from repeatedly grabbing the same recently-worked
/// draft; it is a heuristic, not a mutex.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_resumable_drafts(
    pool: &PgPool,
    site_slugs: &[String],
    max_attempts: i32,
    soft_lock_secs: u64,
) -> Result<Vec<DraftRow>, DbError> {
    let sql = format!(
        "SELECT {DRAFT_COLUMNS} FROM drafts \
         WHERE phase NOT IN ('reservoir', 'rejected') \
           AND phase_attempts < $1 \
           AND site_slug = ANY($2) \
           AND updated_at < NOW() - make_interval(secs => $3) \
         ORDER BY updated_at ASC"
    );

    #[allow(clippy::cast_precision_loss)]
    let rows = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(max_attempts)
        .bind(site_slugs)
        .bind(soft_lock_secs as f64)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Lists drafts, optionally filtered by site and phase, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_drafts(
    pool: &PgPool,
    site_slug: Option<&str>,
    phase: Option<&str>,
    limit: i64,
) -> Result<Vec<DraftRow>, DbError> {
    let sql = format!(
        "SELECT {DRAFT_COLUMNS} FROM drafts \
         WHERE ($1::text IS NULL OR site_slug = $1) \
           AND ($2::text IS NULL OR phase = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(site_slug)
        .bind(phase)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Lists `reservoir` drafts in the marginal score band `[gate, promote)`.
///
/// These are the enhancement runner's candidates: good enough to keep,
/// not yet safe to publish.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_marginal_reservoir_drafts(
    pool: &PgPool,
    gate_threshold: i32,
    promote_threshold: i32,
    limit: i64,
) -> Result<Vec<DraftRow>, DbError> {
    let sql = format!(
        "SELECT {DRAFT_COLUMNS} FROM drafts \
         WHERE phase = 'reservoir' \
           AND score IS NOT NULL \
           AND score >= $1 AND score < $2 \
         ORDER BY score ASC, updated_at ASC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(gate_threshold)
        .bind(promote_threshold)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Advances a draft to `next_phase`, merging the patch the phase produced.
///
/// The update is conditional on the draft still being in `expected_phase`
/// (if another runner advanced it first, zero rows match and
/// [`DbError::InvalidPhaseTransition`] is returned. On success the attempt
/// counter resets to zero and `phase_started_at` is stamped; terminal
/// phases also stamp `completed_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidPhaseTransition`] on a lost race, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn advance_draft_phase(
    pool: &PgPool,
    id: i64,
    expected_phase: &str,
    next_phase: &str,
    patch: &DraftPatch,
) -> Result<DraftRow, DbError> {
    let sql = format!(
        "UPDATE drafts SET \
             phase              = $3, \
             phase_attempts     = 0, \
             last_error         = NULL, \
             sections_total     = COALESCE($4, sections_total), \
             sections_completed = COALESCE($5, sections_completed), \
             research           = COALESCE($6, research), \
             outline            = COALESCE($7, outline), \
             sections           = COALESCE($8, sections), \
             body_html          = COALESCE($9, body_html), \
             body_html_alt      = COALESCE($10, body_html_alt), \
             seo                = COALESCE($11, seo), \
             score              = COALESCE($12, score), \
             readability        = COALESCE($13, readability), \
             rejection_reason   = COALESCE($14, rejection_reason), \
             phase_started_at   = NOW(), \
             updated_at         = NOW(), \
             completed_at       = CASE WHEN $3 IN ('reservoir', 'rejected') \
                                       THEN NOW() ELSE completed_at END \
         WHERE id = $1 AND phase = $2 \
         RETURNING {DRAFT_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DraftRow>(&sql)
        .bind(id)
        .bind(expected_phase)
        .bind(next_phase)
        .bind(patch.sections_total)
        .bind(patch.sections_completed)
        .bind(&patch.research)
        .bind(&patch.outline)
        .bind(&patch.sections)
        .bind(&patch.body_html)
        .bind(&patch.body_html_alt)
        .bind(&patch.seo)
        .bind(patch.score)
        .bind(patch.readability)
        .bind(&patch.rejection_reason)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| DbError::InvalidPhaseTransition {
        id,
        expected_phase: expected_phase.to_string(),
    })
}

/// Records a failed phase attempt: bumps the counter and stores the error.
///
/// Returns the new attempt count so the caller can apply the retry
/// ceiling. Phase is left unchanged; rejection is a separate, explicit
/// decision made by the runner.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the draft does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_phase_failure(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<i32, DbError> {
    let attempts = sqlx::query_scalar::<_, i32>(
        "UPDATE drafts \
         SET phase_attempts = phase_attempts + 1, \
             last_error = $2, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING phase_attempts",
    )
    .bind(id)
    .bind(error_message)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(attempts)
}

/// Force-terminates a draft into `rejected` with a composed reason.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the draft does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn reject_draft(pool: &PgPool, id: i64, reason: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE drafts \
         SET phase = 'rejected', \
             rejection_reason = $2, \
             completed_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Claims a draft for work by refreshing its soft lock.
///
/// Conditional on the draft still being outside the soft-lock window, so
/// two step-runner instances racing on the same draft see exactly one
/// winner; the loser gets `false` and moves on to other work.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_draft(pool: &PgPool, id: i64, soft_lock_secs: u64) -> Result<bool, DbError> {
    #[allow(clippy::cast_precision_loss)]
    let result = sqlx::query(
        "UPDATE drafts SET updated_at = NOW() \
         WHERE id = $1 \
           AND updated_at < NOW() - make_interval(secs => $2)",
    )
    .bind(id)
    .bind(soft_lock_secs as f64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts drafts currently parked in `reservoir` for a site.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_reservoir_drafts(pool: &PgPool, site_slug: &str) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM drafts WHERE site_slug = $1 AND phase = 'reservoir'",
    )
    .bind(site_slug)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Reconciles drafts stranded by crashed prior runs.
///
/// A draft that already exhausted its attempt ceiling but was never
/// terminated (the rejecting runner died between bookkeeping and
/// rejection) is forced into `rejected` here. Returns the number of
/// drafts swept.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_stalled_drafts(pool: &PgPool, max_attempts: i32) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE drafts \
         SET phase = 'rejected', \
             rejection_reason = 'swept: phase ''' || phase || ''' exhausted ' \
                 || phase_attempts || ' attempts without termination', \
             completed_at = NOW(), \
             updated_at = NOW() \
         WHERE phase NOT IN ('reservoir', 'rejected') \
           AND phase_attempts >= $1",
    )
    .bind(max_attempts)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Persists the result of an enhancement pass: revised body, metadata,
/// and rescore. Clears the stored error only when the caller says the
/// new score cleared the promotion threshold.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the draft does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn store_enhancement(
    pool: &PgPool,
    id: i64,
    body_html: &str,
    seo: &Value,
    score: i32,
    clear_error: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE drafts \
         SET body_html = $2, \
             seo = $3, \
             score = $4, \
             last_error = CASE WHEN $5 THEN NULL ELSE last_error END, \
             updated_at = NOW() \
         WHERE id = $1 AND phase = 'reservoir'",
    )
    .bind(id)
    .bind(body_html)
    .bind(seo)
    .bind(score)
    .bind(clear_error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
