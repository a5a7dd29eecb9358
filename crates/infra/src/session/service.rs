//! Session lifecycle: login, refresh rotation, logout, and the per-request
//! authenticate/authorize checks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use warden_auth::{
    AuthError, IdentityContext, KeyMaterial, Permission, RefreshError, RefreshSecret,
    SessionSnapshot, TokenIssuer, TokenVerifier,
};
use warden_core::SessionRef;

use crate::config::AuthConfig;
use crate::identity::CredentialVerifier;

use super::store::SessionStore;

/// What a successful login or refresh hands back to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_secret: RefreshSecret,
    pub session_ref: SessionRef,
}

impl core::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_secret", &self.refresh_secret)
            .field("session_ref", &self.session_ref)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SessionService {
    store: SessionStore,
    credentials: CredentialVerifier,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionService {
    pub fn new(
        config: &AuthConfig,
        keys: Arc<KeyMaterial>,
        store: SessionStore,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            store,
            credentials,
            issuer: TokenIssuer::new(keys.clone()),
            verifier: TokenVerifier::new(keys),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Check credentials and open a new session.
    ///
    /// The session is written first; if anything after that fails it is
    /// deleted again so a half-finished login leaves nothing behind.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, secret: &str) -> Result<IssuedTokens, AuthError> {
        let verified = self.credentials.verify(email, secret).await?;

        let session_ref = SessionRef::generate();
        let snapshot = SessionSnapshot {
            user_id: verified.record.id,
            email: verified.record.email,
            role: verified.record.role,
            perms: verified.permissions,
            created_at: Utc::now(),
        };
        self.store.put(&session_ref, &snapshot, self.access_ttl).await?;

        match self.mint(&session_ref).await {
            Ok(tokens) => {
                info!(identity_id = %snapshot.user_id, "session opened");
                Ok(tokens)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.remove(&session_ref).await {
                    warn!(error = %cleanup, "failed to roll back partial login");
                }
                Err(e)
            }
        }
    }

    /// Consume a refresh secret and issue a fresh token pair for its session.
    ///
    /// The pointer is taken (read + delete) in one store operation, so of two
    /// concurrent refreshes with the same secret only one can proceed. If the
    /// session TTL is extended but the new pointer write fails, the caller
    /// holds a live session with no refresh secret and must log in again.
    #[instrument(skip_all)]
    pub async fn refresh(&self, presented: &RefreshSecret) -> Result<IssuedTokens, AuthError> {
        let session_ref = self
            .store
            .take_pointer(&presented.digest())
            .await?
            .ok_or(RefreshError::NotFound)?;

        if !self.store.extend(&session_ref, self.access_ttl).await? {
            debug!(%session_ref, "refresh pointer outlived its session");
            return Err(RefreshError::SessionGone.into());
        }

        self.mint(&session_ref).await
    }

    /// Delete the session and every refresh pointer aimed at it.
    ///
    /// Safe to repeat: a second call finds nothing and succeeds.
    #[instrument(skip_all, fields(%session_ref))]
    pub async fn logout(&self, session_ref: &SessionRef) -> Result<(), AuthError> {
        self.store.remove(session_ref).await?;
        let purged = self.store.purge_pointers(session_ref).await?;
        info!(purged, "session closed");
        Ok(())
    }

    /// Verify a bearer token and load the session it points at. No writes.
    pub async fn authenticate(&self, token: &str) -> Result<IdentityContext, AuthError> {
        let session_ref = self.verifier.verify(token, Utc::now())?;
        let snapshot = self.store.load(&session_ref).await?;
        Ok(IdentityContext::from_snapshot(session_ref, snapshot))
    }

    /// [`Self::authenticate`] followed by an exact permission check.
    pub async fn authorize(
        &self,
        token: &str,
        required: &Permission,
    ) -> Result<IdentityContext, AuthError> {
        let identity = self.authenticate(token).await?;
        warden_auth::authorize(&identity, required)?;
        Ok(identity)
    }

    async fn mint(&self, session_ref: &SessionRef) -> Result<IssuedTokens, AuthError> {
        let access_token = self.issuer.sign(session_ref, self.access_ttl, Utc::now())?;
        let refresh_secret = RefreshSecret::generate();
        self.store
            .put_pointer(&refresh_secret.digest(), session_ref, self.refresh_ttl)
            .await?;

        Ok(IssuedTokens {
            access_token,
            refresh_secret,
            session_ref: session_ref.clone(),
        })
    }
}
