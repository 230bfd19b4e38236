//! Database operations for the `events` table.
//!
//! One row per received push notification. Rows are inserted on receipt
//! with the stock delta pre-populated, then mutated exactly once to mark
//! the asynchronous processing outcome. The core never deletes them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::DbError;

/// A new event record, derived from an authenticated push notification.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub topic: String,
    pub action: String,
    pub product_id: i64,
    pub payload: String,
    pub signature: String,
    pub name: String,
    pub kind: String,
    pub old_stock_status: Option<String>,
    pub new_stock_status: Option<String>,
    pub old_stock_quantity: Option<i64>,
    pub new_stock_quantity: Option<i64>,
    pub stock_delta: Option<i64>,
    pub retailer_id: Option<String>,
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct EventRow {
    pub id: i64,
    pub topic: String,
    pub action: String,
    pub product_id: i64,
    pub name: String,
    pub kind: String,
    pub old_stock_status: Option<String>,
    pub new_stock_status: Option<String>,
    pub old_stock_quantity: Option<i64>,
    pub new_stock_quantity: Option<i64>,
    pub stock_delta: Option<i64>,
    pub retailer_id: Option<String>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inserts an event row and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_event(pool: &SqlitePool, event: &NewEvent) -> Result<i64, DbError> {
    let now = Utc::now();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO events \
             (topic, action, product_id, payload, signature, name, kind, \
              old_stock_status, new_stock_status, old_stock_quantity, new_stock_quantity, \
              stock_delta, retailer_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
         RETURNING id",
    )
    .bind(&event.topic)
    .bind(&event.action)
    .bind(event.product_id)
    .bind(&event.payload)
    .bind(&event.signature)
    .bind(&event.name)
    .bind(&event.kind)
    .bind(&event.old_stock_status)
    .bind(&event.new_stock_status)
    .bind(event.old_stock_quantity)
    .bind(event.new_stock_quantity)
    .bind(event.stock_delta)
    .bind(&event.retailer_id)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Marks an event processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_event_processed(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query("UPDATE events SET processed = 1, processed_at = ?1, error = NULL WHERE id = ?2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks an event errored with the failure text. The row stays
/// unprocessed so the failure is visible in the status counters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_event_error(pool: &SqlitePool, id: i64, error: &str) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query("UPDATE events SET processed_at = ?1, error = ?2 WHERE id = ?3")
        .bind(now)
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// The most recent events, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_events(pool: &SqlitePool, limit: i64) -> Result<Vec<EventRow>, DbError> {
    let rows = sqlx::query_as::<_, EventRow>(
        "SELECT id, topic, action, product_id, name, kind, \
                old_stock_status, new_stock_status, old_stock_quantity, new_stock_quantity, \
                stock_delta, retailer_id, processed, processed_at, error, created_at \
         FROM events ORDER BY created_at DESC, id DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(product_id: i64, action: &str) -> NewEvent {
        NewEvent {
            topic: format!("product.{action}"),
            action: action.to_string(),
            product_id,
            payload: "{}".to_string(),
            signature: "sig".to_string(),
            name: "Shirt".to_string(),
            kind: "simple".to_string(),
            old_stock_quantity: Some(7),
            new_stock_quantity: Some(5),
            stock_delta: Some(-2),
            retailer_id: Some(format!("wc_{product_id}")),
            ..NewEvent::default()
        }
    }

    #[tokio::test]
    async fn insert_and_mark_processed() {
        let pool = crate::connect_memory().await.expect("pool");
        let id = insert_event(&pool, &event(42, "updated")).await.expect("insert");

        mark_event_processed(&pool, id).await.expect("mark");
        let rows = recent_events(&pool, 10).await.expect("recent");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].processed);
        assert!(rows[0].processed_at.is_some());
        assert!(rows[0].error.is_none());
        assert_eq!(rows[0].stock_delta, Some(-2));
    }

    #[tokio::test]
    async fn mark_error_keeps_row_unprocessed() {
        let pool = crate::connect_memory().await.expect("pool");
        let id = insert_event(&pool, &event(42, "updated")).await.expect("insert");

        mark_event_error(&pool, id, "upstream 500").await.expect("mark");
        let rows = recent_events(&pool, 10).await.expect("recent");
        assert!(!rows[0].processed);
        assert_eq!(rows[0].error.as_deref(), Some("upstream 500"));
    }

    #[tokio::test]
    async fn recent_events_are_newest_first() {
        let pool = crate::connect_memory().await.expect("pool");
        for id in [1, 2, 3] {
            insert_event(&pool, &event(id, "created")).await.expect("insert");
        }
        let rows = recent_events(&pool, 2).await.expect("recent");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, 3);
        assert_eq!(rows[1].product_id, 2);
    }
}
