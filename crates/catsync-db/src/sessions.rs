//! Database operations for the `sessions` table. Session glue for the
//! operator API; internals beyond token/creation/expiry are out of scope.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Creates a session row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_session(
    pool: &SqlitePool,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query("INSERT INTO sessions (token, created_at, expires_at) VALUES (?1, ?2, ?3)")
        .bind(token)
        .bind(now)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetches a session if it exists and has not expired.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_valid_session(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<SessionRow>, DbError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT token, created_at, expires_at FROM sessions \
         WHERE token = ?1 AND expires_at > ?2",
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes a session. Returns `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Removes expired sessions. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64, DbError> {
    let now = Utc::now();
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
