use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use catsync_engine::{WebhookError, WebhookHeaders};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct WebhookAccepted {
    event_id: i64,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// `POST /webhooks/woocommerce`: authenticated push notifications from
/// the source store. Answers as soon as the event row is written; the
/// replication work happens in a background task so the sender never
/// times out and re-delivers.
pub(super) async fn receive(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let webhook_headers = WebhookHeaders {
        topic: header_value(&headers, "x-wc-webhook-topic"),
        signature: header_value(&headers, "x-wc-webhook-signature"),
        source: header_value(&headers, "x-wc-webhook-source"),
        delivery_id: header_value(&headers, "x-wc-webhook-delivery-id"),
    };

    match state.webhooks.handle(&webhook_headers, &body).await {
        Ok(event_id) => Json(ApiResponse {
            data: WebhookAccepted { event_id },
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response(),
        Err(WebhookError::Rejected(rejection)) => {
            tracing::warn!(?rejection, "webhook rejected");
            let status = StatusCode::from_u16(rejection.status_code())
                .unwrap_or(StatusCode::BAD_REQUEST);
            let code = match status {
                StatusCode::UNAUTHORIZED => "unauthorized",
                StatusCode::FORBIDDEN => "forbidden",
                _ => "bad_request",
            };
            ApiError::new(req_id.0, code, format!("{rejection:?}")).into_response()
        }
        Err(WebhookError::Engine(e)) => {
            tracing::error!(error = %e, "webhook ingestion failed");
            ApiError::new(req_id.0, "internal_error", "webhook ingestion failed")
                .into_response()
        }
    }
}
