//! Cache counters for the operator status endpoint.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::DbError;

/// Aggregate counters over the cache tables.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub products_total: i64,
    pub products_in_stock: i64,
    pub variations_total: i64,
    pub variations_in_stock: i64,
    pub sync_synced: i64,
    pub sync_pending: i64,
    pub sync_error: i64,
    pub events_total: i64,
    pub events_processed: i64,
    pub events_errored: i64,
}

/// Collects all counters in one pass of simple aggregates.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn collect_stats(pool: &SqlitePool) -> Result<CacheStats, DbError> {
    let count = |sql: &'static str| async move {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
    };

    Ok(CacheStats {
        products_total: count("SELECT COUNT(*) FROM products").await?,
        products_in_stock: count(
            "SELECT COUNT(*) FROM products WHERE stock_status = 'instock'",
        )
        .await?,
        variations_total: count("SELECT COUNT(*) FROM variations").await?,
        variations_in_stock: count(
            "SELECT COUNT(*) FROM variations WHERE stock_status = 'instock'",
        )
        .await?,
        sync_synced: count("SELECT COUNT(*) FROM sync_status WHERE sync_state = 'synced'")
            .await?,
        sync_pending: count("SELECT COUNT(*) FROM sync_status WHERE sync_state = 'pending'")
            .await?,
        sync_error: count("SELECT COUNT(*) FROM sync_status WHERE sync_state = 'error'")
            .await?,
        events_total: count("SELECT COUNT(*) FROM events").await?,
        events_processed: count("SELECT COUNT(*) FROM events WHERE processed = 1").await?,
        events_errored: count("SELECT COUNT(*) FROM events WHERE error IS NOT NULL").await?,
    })
}
