use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one bulk replication run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Products fetched from the source store.
    pub total: usize,
    /// Replicable items emitted to the ad catalog.
    pub in_stock: usize,
    /// Items submitted with method CREATE.
    pub created: usize,
    /// Items submitted with method UPDATE.
    pub updated: usize,
    /// Items that ended the run in the error state.
    pub errors: usize,
    /// Rows not replicable (out-of-stock simples and variations).
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
