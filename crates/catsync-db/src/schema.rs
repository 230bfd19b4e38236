//! Idempotent schema setup.
//!
//! Applied at every startup: `CREATE TABLE IF NOT EXISTS` and `CREATE INDEX
//! IF NOT EXISTS` statements plus [`ensure_column`] calls for columns added
//! after the initial schema shipped. Nothing here drops data; an upgrade is
//! always additive.

use sqlx::SqlitePool;

use crate::DbError;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER NOT NULL DEFAULT 0,
        kind TEXT NOT NULL DEFAULT 'simple',
        name TEXT NOT NULL DEFAULT '',
        sku TEXT NOT NULL DEFAULT '',
        permalink TEXT NOT NULL DEFAULT '',
        regular_price TEXT NOT NULL DEFAULT '',
        sale_price TEXT,
        stock_status TEXT NOT NULL DEFAULT 'outofstock',
        stock_quantity INTEGER,
        description TEXT NOT NULL DEFAULT '',
        images TEXT NOT NULL DEFAULT '[]',
        attributes TEXT NOT NULL DEFAULT '[]',
        categories TEXT NOT NULL DEFAULT '[]',
        variation_ids TEXT NOT NULL DEFAULT '[]',
        retailer_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS variations (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        kind TEXT NOT NULL DEFAULT 'variation',
        name TEXT NOT NULL DEFAULT '',
        sku TEXT NOT NULL DEFAULT '',
        permalink TEXT NOT NULL DEFAULT '',
        regular_price TEXT NOT NULL DEFAULT '',
        sale_price TEXT,
        stock_status TEXT NOT NULL DEFAULT 'outofstock',
        stock_quantity INTEGER,
        description TEXT NOT NULL DEFAULT '',
        images TEXT NOT NULL DEFAULT '[]',
        attributes TEXT NOT NULL DEFAULT '[]',
        categories TEXT NOT NULL DEFAULT '[]',
        retailer_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_status (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        retailer_id TEXT NOT NULL UNIQUE,
        sync_state TEXT NOT NULL DEFAULT 'pending',
        exists_remotely INTEGER NOT NULL DEFAULT 0,
        last_availability TEXT,
        last_inventory INTEGER,
        last_synced_at TEXT,
        last_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        topic TEXT NOT NULL DEFAULT '',
        action TEXT NOT NULL DEFAULT '',
        product_id INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL DEFAULT '',
        signature TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        kind TEXT NOT NULL DEFAULT '',
        old_stock_status TEXT,
        new_stock_status TEXT,
        old_stock_quantity INTEGER,
        new_stock_quantity INTEGER,
        stock_delta INTEGER,
        retailer_id TEXT,
        processed INTEGER NOT NULL DEFAULT 0,
        processed_at TEXT,
        error TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_products_parent ON products(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_stock ON products(stock_status)",
    "CREATE INDEX IF NOT EXISTS idx_variations_parent ON variations(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_variations_stock ON variations(stock_status)",
    "CREATE INDEX IF NOT EXISTS idx_sync_status_state ON sync_status(sync_state)",
    "CREATE INDEX IF NOT EXISTS idx_events_processed ON events(processed)",
    "CREATE INDEX IF NOT EXISTS idx_events_product ON events(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_action ON events(action)",
    "CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at)",
];

/// Columns added after the initial schema shipped. Fresh databases already
/// have them from the `CREATE TABLE`; legacy files pick them up here.
const LATE_COLUMNS: &[(&str, &str)] = &[
    ("sync_status", "last_error TEXT"),
    ("sync_status", "last_inventory INTEGER"),
    ("events", "retailer_id TEXT"),
    ("events", "stock_delta INTEGER"),
];

/// Applies tables, late columns, and indexes. Safe to run on every startup.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any DDL failure other than adding a column
/// that already exists.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    for (table, column) in LATE_COLUMNS {
        ensure_column(pool, table, column).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

/// Adds a column if it does not exist yet. SQLite has no
/// `ADD COLUMN IF NOT EXISTS`, so the duplicate-column error from the
/// engine is caught and ignored instead.
async fn ensure_column(pool: &SqlitePool, table: &str, column_ddl: &str) -> Result<(), DbError> {
    let ddl = format!("ALTER TABLE {table} ADD COLUMN {column_ddl}");
    match sqlx::query(&ddl).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err))
            if db_err.message().contains("duplicate column name") =>
        {
            Ok(())
        }
        Err(e) => {
            tracing::error!(table, column_ddl, error = %e, "schema migration failed");
            Err(e.into())
        }
    }
}
