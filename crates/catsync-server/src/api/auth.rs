//! Session glue for the operator API: single-account login, logout, and a
//! cheap authentication probe. Dashboard internals stay out of scope.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catsync_db::sessions;

use crate::middleware::{extract_token, RequestId, SESSION_COOKIE};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct LoginData {
    token: String,
}

/// `POST /auth/login`: verifies the single operator account and issues a
/// session token, also set as an http-only cookie.
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<LoginRequest>,
) -> Response {
    if request.username != state.config.admin_user
        || request.password != state.config.admin_password
    {
        return ApiError::new(req_id.0, "unauthorized", "invalid credentials").into_response();
    }

    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    if let Err(e) = sessions::create_session(&state.pool, &token, expires_at).await {
        tracing::error!(error = %e, "session creation failed");
        return ApiError::new(req_id.0, "internal_error", "session creation failed")
            .into_response();
    }
    // Expired rows pile up only as fast as logins happen; sweep here.
    if let Err(e) = sessions::purge_expired_sessions(&state.pool).await {
        tracing::warn!(error = %e, "expired-session purge failed");
    }

    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_TTL_HOURS * 3600
    );
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse {
            data: LoginData { token },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub(super) struct LogoutData {
    logged_out: bool,
}

/// `POST /auth/logout`: deletes the presented session.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = extract_token(&headers) else {
        return ApiError::new(req_id.0, "unauthorized", "missing session token")
            .into_response();
    };
    match sessions::delete_session(&state.pool, &token).await {
        Ok(removed) => Json(ApiResponse {
            data: LogoutData {
                logged_out: removed,
            },
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "session deletion failed");
            ApiError::new(req_id.0, "internal_error", "session deletion failed")
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CheckData {
    authenticated: bool,
}

/// `GET /auth/check`: reports whether the presented token maps to a live
/// session. Always answers 200.
pub(super) async fn check(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    let authenticated = match extract_token(&headers) {
        Some(token) => matches!(
            sessions::get_valid_session(&state.pool, &token).await,
            Ok(Some(_))
        ),
        None => false,
    };
    Json(ApiResponse {
        data: CheckData { authenticated },
        meta: ResponseMeta::new(req_id.0),
    })
    .into_response()
}
