//! HTTP application wiring (axum router + middleware).
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: uniform failure responses

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use warden_auth::Permission;
use warden_infra::{RateLimiter, SessionService};

use crate::middleware::{self, AuthState, RateLimitState, RequiredPermission};

pub mod dto;
pub mod errors;
pub mod routes;

/// Everything the router needs, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub limiter: Arc<RateLimiter>,
    pub trusted_proxy_header: Option<HeaderName>,
}

impl AppState {
    pub fn new(
        sessions: SessionService,
        limiter: Arc<RateLimiter>,
        trusted_proxy_header: Option<HeaderName>,
    ) -> Self {
        Self {
            sessions,
            limiter,
            trusted_proxy_header,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            sessions: self.sessions.clone(),
        }
    }

    fn rate_limit_state(&self) -> RateLimitState {
        RateLimitState {
            limiter: self.limiter.clone(),
            trusted_proxy_header: self.trusted_proxy_header.clone(),
        }
    }
}

/// Put every route of `router` behind authenticate-and-authorize for one
/// permission. `router` must already contain its routes.
pub fn guarded(router: Router, auth: AuthState, permission: impl Into<Permission>) -> Router {
    let required = RequiredPermission {
        auth,
        permission: permission.into(),
    };
    router.route_layer(from_fn_with_state(required, middleware::authorize))
}

/// Build the full HTTP router.
///
/// `business` carries the application's own routes, typically wrapped with
/// [`guarded`]. Everything except `/health` is rate limited per client and
/// route, before authentication runs.
pub fn build_app(state: AppState, business: Router) -> Router {
    let public = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .with_state(state.clone());

    let authenticated = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::system::me))
        .route_layer(from_fn_with_state(
            state.auth_state(),
            middleware::authenticate,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(business)
        .route_layer(from_fn_with_state(
            state.rate_limit_state(),
            middleware::rate_limit,
        ))
        .route("/health", get(routes::system::health))
}
