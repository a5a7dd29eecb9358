use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use warden_auth::{AuthError, TokenError};

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please slow down.";

/// Minimal JSON failure body: `{"error": code}`.
pub fn json_error(status: StatusCode, code: &'static str) -> Response {
    (status, axum::Json(json!({ "error": code }))).into_response()
}

pub fn unauthorized() -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized")
}

pub fn rate_limited(retry_after_secs: u64) -> Response {
    let mut res = (
        StatusCode::TOO_MANY_REQUESTS,
        axum::Json(json!({
            "error": "rate_limited",
            "message": RATE_LIMITED_MESSAGE,
            "retry_after": retry_after_secs,
        })),
    )
        .into_response();
    res.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    res
}

/// Map an auth failure to its response.
///
/// Every authentication failure renders the same 401 body so a client cannot
/// tell a bad signature from an expired session. Store trouble is a 503 so it
/// is never mistaken for "not allowed".
pub fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden"),
        AuthError::RateLimited { retry_after_secs } => rate_limited(*retry_after_secs),
        AuthError::StoreUnavailable(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        AuthError::Internal(_)
        | AuthError::KeyMaterialUnavailable
        | AuthError::Token(TokenError::KeyUnavailable) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
        AuthError::CredentialInvalid
        | AuthError::MissingCredential
        | AuthError::Token(_)
        | AuthError::Session(_)
        | AuthError::Refresh(_) => unauthorized(),
    }
}

/// Log the failure kind at a level matching its severity.
pub fn log_auth_error(err: &AuthError) {
    if err.is_transient() || matches!(err, AuthError::Internal(_)) {
        tracing::warn!(kind = err.kind(), error = %err, "request failed");
    } else {
        tracing::debug!(kind = err.kind(), "request rejected");
    }
}
