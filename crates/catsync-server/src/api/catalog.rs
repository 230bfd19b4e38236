use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use catsync_core::FeedStyle;
use catsync_engine::FeedArtifacts;

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct GenerateQuery {
    #[serde(default)]
    refresh: Option<bool>,
}

/// `GET /catalog/generate?refresh=true|false`: writes both CSV styles
/// under the public directory and returns paths plus elapsed time.
pub(super) async fn generate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<ApiResponse<FeedArtifacts>>, ApiError> {
    let refresh = query.refresh.unwrap_or(false);
    let artifacts = state
        .engine
        .write_feeds(&state.config.public_dir, refresh)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: artifacts,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct StreamQuery {
    #[serde(default)]
    style: Option<String>,
}

/// `GET /catalog?style=standard|christmas`: streams one CSV inline from
/// the cache fast path.
pub(super) async fn stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    let style_param = query.style.as_deref().unwrap_or("standard");
    let Some(style) = FeedStyle::from_param(style_param) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("unknown style '{style_param}'"),
        ));
    };

    let csv = state
        .engine
        .generate_feed(style)
        .await
        .map_err(|e| map_engine_error(req_id.0, &e))?;

    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    )
        .into_response())
}
