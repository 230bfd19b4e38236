//! Durable local cache over SQLite: products, variations, sync-status,
//! events, and sessions.
//!
//! The cache file is auto-created (with its parent directory) at the
//! configured path, runs with write-ahead journaling, and enforces foreign
//! keys on every pooled connection. Schema setup is idempotent and never
//! drops data.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

pub mod events;
pub mod products;
pub mod schema;
pub mod sessions;
pub mod stats;
pub mod sync_status;
pub mod variations;

pub use events::{EventRow, NewEvent};
pub use products::ProductRow;
pub use sessions::SessionRow;
pub use stats::CacheStats;
pub use sync_status::SyncStatusRow;
pub use variations::VariationRow;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Opens (creating if missing) the cache database at `path` and applies the
/// schema.
///
/// # Errors
///
/// Returns [`DbError::CreateDir`] if the parent directory cannot be
/// created, or [`DbError::Sqlx`] if the pool cannot be opened or the
/// schema cannot be applied.
pub async fn connect(path: &Path) -> Result<SqlitePool, DbError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    schema::init_schema(&pool).await?;
    Ok(pool)
}

/// Opens an in-memory database with the schema applied. Test helper; the
/// single-connection pool keeps the database alive for the pool's lifetime.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the pool cannot be opened or the schema
/// cannot be applied.
pub async fn connect_memory() -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    schema::init_schema(&pool).await?;
    Ok(pool)
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
