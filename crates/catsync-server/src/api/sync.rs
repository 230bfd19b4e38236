use axum::{extract::State, Extension, Json};
use serde::Serialize;

use catsync_db::{events, stats, CacheStats, EventRow};
use catsync_engine::SyncReport;

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Events shown on the status endpoint.
const RECENT_EVENT_LIMIT: i64 = 20;

/// `POST /sync/initial`: runs the bulk replication path and returns the
/// report. Runs can take minutes; no request deadline is applied.
pub(super) async fn initial_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = state
        .engine
        .run_initial_sync()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: report,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct StatusData {
    cache: CacheStats,
    recent_events: Vec<EventRow>,
}

/// `GET /sync/status`: cache counters plus the most recent events.
pub(super) async fn status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<StatusData>>, ApiError> {
    let cache = stats::collect_stats(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "stats query failed");
        ApiError::new(req_id.0.clone(), "internal_error", "stats query failed")
    })?;
    let recent_events = events::recent_events(&state.pool, RECENT_EVENT_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "event query failed");
            ApiError::new(req_id.0.clone(), "internal_error", "event query failed")
        })?;

    Ok(Json(ApiResponse {
        data: StatusData {
            cache,
            recent_events,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
