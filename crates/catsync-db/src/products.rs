//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use catsync_core::{retailer, ProductKind, SourceProduct, StockStatus};

use crate::DbError;

/// A row from the `products` table. The list-valued source fields are
/// stored as JSON text columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
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
    pub variation_ids: String,
    pub retailer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Rehydrates the source-product shape from the row, parsing the JSON
    /// columns. Malformed JSON (impossible unless the file was edited by
    /// hand) degrades to empty lists.
    #[must_use]
    pub fn to_source(&self) -> SourceProduct {
        SourceProduct {
            id: self.id,
            parent_id: self.parent_id,
            kind: ProductKind::from_wire(&self.kind),
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
            variations: serde_json::from_str(&self.variation_ids).unwrap_or_default(),
        }
    }
}

const SELECT_COLUMNS: &str = "id, parent_id, kind, name, sku, permalink, regular_price, \
     sale_price, stock_status, stock_quantity, description, images, attributes, categories, \
     variation_ids, retailer_id, created_at, updated_at";

/// Upserts a product row, conflict-resolved by id. `updated_at` is always
/// refreshed; `created_at` survives from the first insert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, [`DbError::Json`] if a
/// list column cannot be serialized.
pub async fn upsert_product(pool: &SqlitePool, product: &SourceProduct) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    upsert_product_conn(&mut *conn, product).await
}

/// Upserts a full product list in a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails. Nothing
/// is written unless every row succeeds.
pub async fn bulk_upsert_products(
    pool: &SqlitePool,
    products: &[SourceProduct],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    for product in products {
        upsert_product_conn(&mut *tx, product).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub(crate) async fn upsert_product_conn(
    conn: &mut SqliteConnection,
    product: &SourceProduct,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO products \
             (id, parent_id, kind, name, sku, permalink, regular_price, sale_price, \
              stock_status, stock_quantity, description, images, attributes, categories, \
              variation_ids, retailer_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17) \
         ON CONFLICT(id) DO UPDATE SET \
             parent_id      = excluded.parent_id, \
             kind           = excluded.kind, \
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
             variation_ids  = excluded.variation_ids, \
             retailer_id    = excluded.retailer_id, \
             updated_at     = excluded.updated_at",
    )
    .bind(product.id)
    .bind(product.parent_id)
    .bind(product.kind.as_str())
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.permalink)
    .bind(&product.regular_price)
    .bind(&product.sale_price)
    .bind(product.stock_status.as_str())
    .bind(product.stock_quantity)
    .bind(&product.description)
    .bind(serde_json::to_string(&product.images)?)
    .bind(serde_json::to_string(&product.attributes)?)
    .bind(serde_json::to_string(&product.categories)?)
    .bind(serde_json::to_string(&product.variations)?)
    .bind(retailer::retailer_id_for(product))
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetches one product by source id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes a product row; variations and sync-status rows cascade. Returns
/// `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_product(pool: &SqlitePool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// In-stock simple products, ordered by id for stable feed output.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_in_stock_simple(pool: &SqlitePool) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM products \
         WHERE kind = 'simple' AND stock_status = 'instock' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// In-stock variable parents, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_in_stock_variable(pool: &SqlitePool) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM products \
         WHERE kind = 'variable' AND stock_status = 'instock' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
