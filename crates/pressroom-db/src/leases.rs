//! Cross-process runner leases.
//!
//! A lease is a row in `runner_leases` with an expiry. Acquisition is a
//! conditional upsert: the insert wins on a free name, the update wins
//! only when the existing lease has expired. Multiple process instances
//! coordinate purely through this table; there is no in-process guard.

use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Attempts to acquire `name` for `ttl_secs`. Returns `true` on success.
///
/// A `false` result means another live holder owns the lease; the caller
/// should skip its work for this invocation rather than wait.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn acquire_lease(
    pool: &PgPool,
    name: &str,
    holder: Uuid,
    ttl_secs: u64,
) -> Result<bool, DbError> {
    #[allow(clippy::cast_precision_loss)]
    let result = sqlx::query(
        "INSERT INTO runner_leases (name, holder, expires_at) \
         VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
         ON CONFLICT (name) DO UPDATE \
             SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at \
             WHERE runner_leases.expires_at < NOW()",
    )
    .bind(name)
    .bind(holder)
    .bind(ttl_secs as f64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Releases `name` if still held by `holder`. A lease held by someone
/// else (ours expired and was re-acquired) is left alone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn release_lease(pool: &PgPool, name: &str, holder: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM runner_leases WHERE name = $1 AND holder = $2")
        .bind(name)
        .bind(holder)
        .execute(pool)
        .await?;

    Ok(())
}
