//! Database operations for the `sync_status` table.
//!
//! One row per replicable id (per future ad-catalog entry), keyed by
//! retailer id. For variations, `product_id` points at the owning top-level
//! product row so the cascade from a product deletion covers the whole
//! family.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::DbError;

pub const STATE_PENDING: &str = "pending";
pub const STATE_SYNCED: &str = "synced";
pub const STATE_ERROR: &str = "error";

/// A row from the `sync_status` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncStatusRow {
    pub id: i64,
    pub product_id: i64,
    pub retailer_id: String,
    pub sync_state: String,
    pub exists_remotely: bool,
    pub last_availability: Option<String>,
    pub last_inventory: Option<i64>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncStatusRow {
    /// The stock-change test used by the targeted path: anything differing
    /// in availability or inventory counts as changed.
    #[must_use]
    pub fn stock_changed(&self, availability: &str, inventory: Option<i64>) -> bool {
        self.last_availability.as_deref() != Some(availability)
            || self.last_inventory != inventory
    }
}

const SELECT_COLUMNS: &str = "id, product_id, retailer_id, sync_state, exists_remotely, \
     last_availability, last_inventory, last_synced_at, last_error, created_at, updated_at";

/// Creates the row for a retailer id the first time it is presented, or
/// re-points `product_id` on conflict. The sync state is left untouched on
/// conflict; marking happens through the dedicated mutators.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_sync_status(
    pool: &SqlitePool,
    product_id: i64,
    retailer_id: &str,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sync_status (product_id, retailer_id, sync_state, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT(retailer_id) DO UPDATE SET \
             product_id = excluded.product_id, \
             updated_at = excluded.updated_at",
    )
    .bind(product_id)
    .bind(retailer_id)
    .bind(STATE_PENDING)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetches the row for a retailer id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_status(
    pool: &SqlitePool,
    retailer_id: &str,
) -> Result<Option<SyncStatusRow>, DbError> {
    let row = sqlx::query_as::<_, SyncStatusRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sync_status WHERE retailer_id = ?1"
    ))
    .bind(retailer_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Marks a row synced, stamping the observed availability and inventory and
/// latching remote existence. Clears any previous error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_synced(
    pool: &SqlitePool,
    retailer_id: &str,
    availability: &str,
    inventory: Option<i64>,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE sync_status SET \
             sync_state = ?1, \
             exists_remotely = 1, \
             last_availability = ?2, \
             last_inventory = ?3, \
             last_synced_at = ?4, \
             last_error = NULL, \
             updated_at = ?4 \
         WHERE retailer_id = ?5",
    )
    .bind(STATE_SYNCED)
    .bind(availability)
    .bind(inventory)
    .bind(now)
    .bind(retailer_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a row errored with the failure text.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_error(
    pool: &SqlitePool,
    retailer_id: &str,
    error: &str,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE sync_status SET \
             sync_state = ?1, \
             last_error = ?2, \
             updated_at = ?3 \
         WHERE retailer_id = ?4",
    )
    .bind(STATE_ERROR)
    .bind(error)
    .bind(now)
    .bind(retailer_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Removes the row for one retailer id. Only used when a single variation
/// is deleted upstream; product deletions rely on the cascade instead.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_sync_status(pool: &SqlitePool, retailer_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM sync_status WHERE retailer_id = ?1")
        .bind(retailer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Flips the remote-existence latch without touching the sync state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_exists_remotely(
    pool: &SqlitePool,
    retailer_id: &str,
    exists: bool,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE sync_status SET exists_remotely = ?1, updated_at = ?2 WHERE retailer_id = ?3",
    )
    .bind(exists)
    .bind(now)
    .bind(retailer_id)
    .execute(pool)
    .await?;
    Ok(())
}
