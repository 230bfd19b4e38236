//! Batch-response interpretation, shared by the bulk and targeted paths so
//! the two cannot diverge on what a response shape means.

use catsync_ads::BatchResponse;
use catsync_db::{sync_status, DbError};
use sqlx::SqlitePool;

/// What the engine promised the remote side about one submitted item; used
/// to stamp sync-status after the response is interpreted.
#[derive(Debug, Clone)]
pub(crate) struct PendingItem {
    pub retailer_id: String,
    pub availability: String,
    pub inventory: Option<i64>,
}

/// Per-chunk tallies after interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChunkOutcome {
    pub synced: usize,
    pub errored: usize,
}

/// Applies one batch response to the sync-status rows of the submitted
/// items.
///
/// - A top-level `error` marks every item in the chunk as error.
/// - A `validation_status` array marks listed items with errors as error
///   and everything else as synced.
/// - Bare handles (or an empty response) mean the remote accepted the
///   chunk for async processing; every item is optimistically synced.
pub(crate) async fn apply_batch_response(
    pool: &SqlitePool,
    items: &[PendingItem],
    response: &BatchResponse,
) -> Result<ChunkOutcome, DbError> {
    let mut outcome = ChunkOutcome::default();

    if let Some(error) = &response.error {
        let message = if error.message.is_empty() {
            "batch rejected".to_string()
        } else {
            error.message.clone()
        };
        for item in items {
            sync_status::mark_error(pool, &item.retailer_id, &message).await?;
            outcome.errored += 1;
        }
        return Ok(outcome);
    }

    if let Some(statuses) = &response.validation_status {
        for item in items {
            let status = statuses
                .iter()
                .find(|s| s.retailer_id == item.retailer_id);
            match status {
                Some(s) if s.has_errors() => {
                    sync_status::mark_error(pool, &item.retailer_id, &s.error_summary())
                        .await?;
                    outcome.errored += 1;
                }
                _ => {
                    sync_status::mark_synced(
                        pool,
                        &item.retailer_id,
                        &item.availability,
                        item.inventory,
                    )
                    .await?;
                    outcome.synced += 1;
                }
            }
        }
        return Ok(outcome);
    }

    // Handles only (or nothing at all): accepted for async processing.
    for item in items {
        sync_status::mark_synced(pool, &item.retailer_id, &item.availability, item.inventory)
            .await?;
        outcome.synced += 1;
    }
    Ok(outcome)
}
