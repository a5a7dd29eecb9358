use axum::{Extension, Json, response::IntoResponse};

use warden_auth::IdentityContext;

pub async fn health() -> Json<&'static str> {
    Json("success")
}

/// The identity attached by the authentication gate.
pub async fn me(Extension(identity): Extension<IdentityContext>) -> impl IntoResponse {
    Json(identity)
}
