use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderName, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use warden_auth::{AuthError, Permission};
use warden_infra::{Admission, BucketKey, RateLimiter, SessionService};

use crate::app::errors::{auth_error_response, log_auth_error, rate_limited};
use crate::context::client_identifier;

#[derive(Debug, Clone)]
pub struct AuthState {
    pub sessions: SessionService,
}

/// State for the authenticate-and-authorize variant of the gate.
#[derive(Debug, Clone)]
pub struct RequiredPermission {
    pub auth: AuthState,
    pub permission: Permission,
}

#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trusted_proxy_header: Option<HeaderName>,
}

/// Verify the bearer token, load its session and attach the
/// [`warden_auth::IdentityContext`] for handlers.
pub async fn authenticate(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token.to_owned(),
        Err(e) => return reject(&e),
    };

    match state.sessions.authenticate(&token).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => reject(&e),
    }
}

/// [`authenticate`] plus an exact permission check.
pub async fn authorize(
    State(required): State<RequiredPermission>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token.to_owned(),
        Err(e) => return reject(&e),
    };

    match required
        .auth
        .sessions
        .authorize(&token, &required.permission)
        .await
    {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => reject(&e),
    }
}

/// Token-bucket admission per (client, matched route).
///
/// Must be installed with `route_layer` so the matched route template is
/// known; otherwise the raw path is used.
pub async fn rate_limit(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client = client_identifier(
        req.headers(),
        req.extensions(),
        state.trusted_proxy_header.as_ref(),
    );

    let key = BucketKey::new(client, route);
    match state.limiter.check(&key) {
        Admission::Allowed => next.run(req).await,
        limited @ Admission::Limited { .. } => {
            let retry_after = limited.retry_after_secs().unwrap_or(1);
            tracing::info!(client = %key.client, route = %key.route, retry_after, "rate limited");
            rate_limited(retry_after)
        }
    }
}

fn reject(err: &AuthError) -> Response {
    log_auth_error(err);
    auth_error_response(err)
}

/// `Authorization: Bearer <token>`: exactly two whitespace-separated parts,
/// scheme matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MissingCredential)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MissingCredential),
    }
}
