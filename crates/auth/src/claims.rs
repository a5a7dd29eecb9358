use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::SessionRef;

use crate::TokenError;

/// Issuer claim stamped into (and required of) every access token.
pub const ISSUER: &str = "warden";

/// Access-token claims.
///
/// Deliberately minimal: the token proves a session reference and nothing
/// else. Roles and permissions are always re-read from the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Session reference.
    pub sub: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    pub iss: String,
}

/// Claims as decoded from a token whose signature has been checked but whose
/// contents have not. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UnverifiedClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

/// Deterministically validate decoded claims and return the session reference.
///
/// Checks, in order: issuer, presence of expiry, expiry (`now > exp` is
/// expired), presence and shape of the subject.
pub fn validate_claims(
    claims: &UnverifiedClaims,
    now: DateTime<Utc>,
) -> Result<SessionRef, TokenError> {
    if claims.iss.as_deref() != Some(ISSUER) {
        return Err(TokenError::BadIssuer);
    }

    let exp = claims.exp.ok_or(TokenError::Malformed)?;
    if now.timestamp() > exp {
        return Err(TokenError::Expired);
    }

    let sub = claims.sub.as_deref().ok_or(TokenError::Malformed)?;
    sub.parse::<SessionRef>().map_err(|_| TokenError::Malformed)
}
