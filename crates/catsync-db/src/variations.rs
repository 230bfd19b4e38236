//! Database operations for the `variations` table.
//!
//! Variations live in their own table so the feed fast path can enumerate
//! them without touching `products`. Rows are written only by the
//! replication engine while walking a variable parent; deleting the parent
//! cascades here.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use catsync_core::{retailer, ProductKind, SourceProduct, StockStatus};

use crate::DbError;

/// A row from the `variations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariationRow {
    pub id: i64,
    pub parent_id: i64,
    pub kind: String,
    pub name: String,
    pub sku: String,
    pub permalink: String,
    pub regular_price: String,
    pub sale_price: Option<String>,
    pub stock_status: String,
    pub stock_quantity: Option<i64>,
    pub description: String,
    pub images: String,
    pub attributes: String,
    pub categories: String,
    pub retailer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VariationRow {
    #[must_use]
    pub fn to_source(&self) -> SourceProduct {
        SourceProduct {
            id: self.id,
            parent_id: self.parent_id,
            kind: ProductKind::Variation,
            name: self.name.clone(),
            sku: self.sku.clone(),
            permalink: self.permalink.clone(),
            regular_price: self.regular_price.clone(),
            sale_price: self.sale_price.clone(),
            stock_status: StockStatus::from_wire(&self.stock_status),
            stock_quantity: self.stock_quantity,
            description: self.description.clone(),
            images: serde_json::from_str(&self.images).unwrap_or_default(),
            attributes: serde_json::from_str(&self.attributes).unwrap_or_default(),
            categories: serde_json::from_str(&self.categories).unwrap_or_default(),
            variations: Vec::new(),
        }
    }
}

const SELECT_COLUMNS: &str = "id, parent_id, kind, name, sku, permalink, regular_price, \
     sale_price, stock_status, stock_quantity, description, images, attributes, categories, \
     retailer_id, created_at, updated_at";

/// Upserts a variation row under the given parent. The parent product row
/// must already exist (foreign key).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including a missing
/// parent), [`DbError::Json`] if a list column cannot be serialized.
pub async fn upsert_variation(
    pool: &SqlitePool,
    parent_id: i64,
    variation: &SourceProduct,
) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    upsert_variation_conn(&mut *conn, parent_id, variation).await
}

/// Upserts a batch of variations under one parent in a single transaction,
/// so the cache never shows a half-written sibling set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn bulk_upsert_variations(
    pool: &SqlitePool,
    groups: &[(i64, Vec<SourceProduct>)],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    for (parent_id, variations) in groups {
        for variation in variations {
            upsert_variation_conn(&mut *tx, *parent_id, variation).await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

async fn upsert_variation_conn(
    conn: &mut SqliteConnection,
    parent_id: i64,
    variation: &SourceProduct,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO variations \
             (id, parent_id, kind, name, sku, permalink, regular_price, sale_price, \
              stock_status, stock_quantity, description, images, attributes, categories, \
              retailer_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16) \
         ON CONFLICT(id) DO UPDATE SET \
             parent_id      = excluded.parent_id, \
             name           = excluded.name, \
             sku            = excluded.sku, \
             permalink      = excluded.permalink, \
             regular_price  = excluded.regular_price, \
             sale_price     = excluded.sale_price, \
             stock_status   = excluded.stock_status, \
             stock_quantity = excluded.stock_quantity, \
             description    = excluded.description, \
             images         = excluded.images, \
             attributes     = excluded.attributes, \
             categories     = excluded.categories, \
             retailer_id    = excluded.retailer_id, \
             updated_at     = excluded.updated_at",
    )
    .bind(variation.id)
    .bind(parent_id)
    .bind(ProductKind::Variation.as_str())
    .bind(&variation.name)
    .bind(&variation.sku)
    .bind(&variation.permalink)
    .bind(&variation.regular_price)
    .bind(&variation.sale_price)
    .bind(variation.stock_status.as_str())
    .bind(variation.stock_quantity)
    .bind(&variation.description)
    .bind(serde_json::to_string(&variation.images)?)
    .bind(serde_json::to_string(&variation.attributes)?)
    .bind(serde_json::to_string(&variation.categories)?)
    .bind(retailer::retailer_id(ProductKind::Variation, variation.id))
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Deletes a single variation row (used when the source deletes one child
/// without touching the parent). Returns `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_variation(pool: &SqlitePool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM variations WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// All cached variations of one parent, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variations(
    pool: &SqlitePool,
    parent_id: i64,
) -> Result<Vec<VariationRow>, DbError> {
    let rows = sqlx::query_as::<_, VariationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM variations WHERE parent_id = ?1 ORDER BY id"
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// In-stock variations of one parent, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_in_stock_variations(
    pool: &SqlitePool,
    parent_id: i64,
) -> Result<Vec<VariationRow>, DbError> {
    let rows = sqlx::query_as::<_, VariationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM variations \
         WHERE parent_id = ?1 AND stock_status = 'instock' ORDER BY id"
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
