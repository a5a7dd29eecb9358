//! Authentication/authorization failure taxonomy.
//!
//! Every kind except [`AuthError::StoreUnavailable`] is terminal: it is never
//! retried internally and surfaces to the caller as "not authenticated" or
//! "not authorized". Transport layers must render all terminal kinds with the
//! same minimal body; the detail here is for logs and tests.

use thiserror::Error;

use crate::Permission;

/// Why an access token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Algorithm or signature does not match the configured public key.
    #[error("bad token signature")]
    BadSignature,

    #[error("unexpected token issuer")]
    BadIssuer,

    #[error("token has expired")]
    Expired,

    /// Undecodable token, or subject/expiry claim absent.
    #[error("malformed token claims")]
    Malformed,

    /// The key needed for this operation (signing or verification) is not loaded.
    #[error("token key unavailable")]
    KeyUnavailable,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Absent from the store. A lapsed TTL and a session that never existed are
    /// indistinguishable by design of the store, so both land here.
    #[error("session expired or revoked")]
    NotFound,

    /// Present but the snapshot could not be decoded.
    #[error("session snapshot is corrupt")]
    Corrupt,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RefreshError {
    /// Never issued, already consumed, or expired. Lookup and consumption are a
    /// single atomic step, so these cases cannot be told apart.
    #[error("invalid or expired refresh token")]
    NotFound,

    /// The pointer was valid but its session had already lapsed.
    #[error("session not found; please login again")]
    SessionGone,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login failed. Unknown identifier and wrong secret are deliberately the same.
    #[error("invalid credentials")]
    CredentialInvalid,

    /// No bearer credential, or not exactly `Bearer <token>`.
    #[error("missing or malformed bearer credential")]
    MissingCredential,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("no signing or verification key material configured")]
    KeyMaterialUnavailable,

    /// A store round-trip failed or timed out. Distinct from every
    /// authentication kind so callers can tell "try later" from "not allowed".
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Whether a later attempt could succeed without the caller changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialInvalid => "credential_invalid",
            Self::MissingCredential => "missing_credential",
            Self::Token(TokenError::BadSignature) => "token_bad_signature",
            Self::Token(TokenError::BadIssuer) => "token_bad_issuer",
            Self::Token(TokenError::Expired) => "token_expired",
            Self::Token(TokenError::Malformed) => "token_malformed",
            Self::Token(TokenError::KeyUnavailable) => "token_key_unavailable",
            Self::Session(SessionError::NotFound) => "session_not_found",
            Self::Session(SessionError::Corrupt) => "session_corrupt",
            Self::Refresh(RefreshError::NotFound) => "refresh_not_found",
            Self::Refresh(RefreshError::SessionGone) => "refresh_session_gone",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::KeyMaterialUnavailable => "key_material_unavailable",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_transient() {
        assert!(AuthError::store("timeout").is_transient());
        assert!(!AuthError::CredentialInvalid.is_transient());
        assert!(!AuthError::from(TokenError::Expired).is_transient());
        assert!(!AuthError::from(RefreshError::NotFound).is_transient());
        assert!(!AuthError::Forbidden(Permission::from("card_view")).is_transient());
    }

    #[test]
    fn kinds_are_distinct_per_token_failure() {
        let kinds = [
            TokenError::BadSignature,
            TokenError::BadIssuer,
            TokenError::Expired,
            TokenError::Malformed,
        ]
        .map(|e| AuthError::from(e).kind());
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
