//! Postgres advisory locks, used so that a tick of a scheduled job only
//! runs on one instance of the service at a time (spec §4.5: "acquire a
//! process-wide lock where multiple instances of the service may run").

use sqlx::PgPool;

use crate::error::TransientError;

/// Runs `body` only if the advisory lock identified by `key` is free,
/// releasing it afterward regardless of outcome. `key` should be a stable,
/// distinct constant per job (see the `*_LOCK_KEY` constants in this
/// module's callers).
pub async fn with_lock<F, Fut>(pool: &PgPool, key: i64, body: F) -> Result<(), TransientError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), TransientError>>,
{
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .bind(key)
        .fetch_one(pool)
        .await
        .map_err(TransientError::Database)?;

    if !acquired {
        tracing::debug!(lock_key = key, "another instance holds this job's lock, skipping tick");
        return Ok(());
    }

    let result = body().await;

    if let Err(error) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(key)
        .execute(pool)
        .await
    {
        tracing::warn!(%error, lock_key = key, "failed to release advisory lock");
    }

    result
}
