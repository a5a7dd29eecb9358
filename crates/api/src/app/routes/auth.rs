use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use warden_auth::{AuthError, IdentityContext, RefreshSecret, TokenError};

use crate::app::AppState;
use crate::app::dto::{LoginRequest, RefreshRequest, TokenResponse};
use crate::app::errors::{auth_error_response, json_error, log_auth_error, unauthorized};

/// `POST /auth/login`. Any malformed body is just another failed login.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        tracing::debug!("login body rejected");
        return unauthorized();
    };

    match state.sessions.login(&req.email, &req.password).await {
        Ok(tokens) => Json(TokenResponse::from(tokens)).into_response(),
        Err(e) => failed(&e),
    }
}

/// `POST /auth/refresh`.
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        tracing::debug!("refresh body rejected");
        return unauthorized();
    };

    let presented = RefreshSecret::presented(req.refresh_token);
    match state.sessions.refresh(&presented).await {
        Ok(tokens) => Json(TokenResponse::from(tokens)).into_response(),
        Err(e) => failed(&e),
    }
}

/// `POST /auth/logout`. The session comes from the verified token, never from
/// the body.
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
) -> Response {
    match state.sessions.logout(identity.session_ref()).await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            log_auth_error(&e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "logout_failed")
        }
    }
}

/// Server faults keep their own status; everything else is a plain 401.
fn failed(err: &AuthError) -> Response {
    log_auth_error(err);
    match err {
        AuthError::StoreUnavailable(_)
        | AuthError::Internal(_)
        | AuthError::KeyMaterialUnavailable
        | AuthError::Token(TokenError::KeyUnavailable) => auth_error_response(err),
        _ => unauthorized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::RefreshError;

    #[test]
    fn missing_signing_key_is_a_server_fault() {
        let res = failed(&AuthError::Token(TokenError::KeyUnavailable));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            failed(&AuthError::KeyMaterialUnavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn credential_failures_stay_unauthorized() {
        for err in [
            AuthError::CredentialInvalid,
            AuthError::Token(TokenError::Expired),
            AuthError::Refresh(RefreshError::NotFound),
            AuthError::Refresh(RefreshError::SessionGone),
        ] {
            assert_eq!(failed(&err).status(), StatusCode::UNAUTHORIZED, "{err:?}");
        }
        assert_eq!(
            failed(&AuthError::store("timed out")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
