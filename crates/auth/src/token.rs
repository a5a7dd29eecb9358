//! Access-token signing and verification (RS256).
//!
//! Key material is loaded once at startup and is immutable afterwards, so both
//! [`TokenIssuer`] and [`TokenVerifier`] are cheap to clone and safe to use from
//! any number of tasks without locking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use warden_core::SessionRef;

use crate::claims::{AccessClaims, ISSUER, UnverifiedClaims, validate_claims};
use crate::{AuthError, TokenError};

/// The only accepted signing algorithm.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("neither a private signing key nor a public verification key is configured")]
    Missing,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

impl From<KeyMaterialError> for AuthError {
    fn from(_: KeyMaterialError) -> Self {
        AuthError::KeyMaterialUnavailable
    }
}

/// Private and/or public RSA key, parsed from PEM.
#[derive(Clone)]
pub struct KeyMaterial {
    signing: Option<EncodingKey>,
    verifying: Option<DecodingKey>,
}

impl KeyMaterial {
    /// Parse PEM-encoded keys (PKCS#1 or PKCS#8).
    ///
    /// At least one key must be present; a process holding neither cannot take
    /// part in the session protocol at all.
    pub fn from_pem(
        private_pem: Option<&[u8]>,
        public_pem: Option<&[u8]>,
    ) -> Result<Self, KeyMaterialError> {
        if private_pem.is_none() && public_pem.is_none() {
            return Err(KeyMaterialError::Missing);
        }

        let signing = private_pem
            .map(EncodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| KeyMaterialError::InvalidPrivateKey(e.to_string()))?;

        let verifying = public_pem
            .map(DecodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| KeyMaterialError::InvalidPublicKey(e.to_string()))?;

        Ok(Self { signing, verifying })
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    pub fn can_verify(&self) -> bool {
        self.verifying.is_some()
    }
}

impl core::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("signing", &self.can_sign())
            .field("verifying", &self.can_verify())
            .finish()
    }
}

/// Mints access tokens.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }

    /// Sign a token for `session_ref` valid from `now` for `ttl`.
    ///
    /// Claims are exactly `sub`, `iat`, `exp` and `iss`.
    pub fn sign(
        &self,
        session_ref: &SessionRef,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let key = self
            .keys
            .signing
            .as_ref()
            .ok_or(AuthError::Token(TokenError::KeyUnavailable))?;

        let iat = now.timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims {
            sub: session_ref.as_str().to_string(),
            iat,
            exp: iat.saturating_add(ttl_secs),
            iss: ISSUER.to_string(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, key)
            .map_err(|e| AuthError::internal(format!("token signing failed: {e}")))
    }
}

/// Verifies access tokens.
///
/// Signature and claim checks only; whether the referenced session is still
/// alive is for the caller to decide.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyMaterial>,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionRef, TokenError> {
        let key = self
            .keys
            .verifying
            .as_ref()
            .ok_or(TokenError::KeyUnavailable)?;

        // Time and issuer are checked by `validate_claims` against the caller's
        // clock; the library only checks algorithm and signature here.
        let mut validation = Validation::new(ALGORITHM);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<UnverifiedClaims>(token, key, &validation)
            .map_err(|e| classify(e.kind()))?;

        validate_claims(&data.claims, now)
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm => TokenError::BadSignature,
        ErrorKind::InvalidIssuer => TokenError::BadIssuer,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
