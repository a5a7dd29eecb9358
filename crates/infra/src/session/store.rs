//! Session snapshots and refresh pointers on top of a [`KeyValueStore`].
//!
//! Key space:
//! - `session:<ref>` → JSON [`SessionSnapshot`], TTL = access TTL
//! - `rt:<sha256(secret)>` → session ref, TTL = refresh TTL
//!
//! Every round-trip runs under `op_timeout`. A timeout or store failure maps to
//! [`AuthError::StoreUnavailable`] and is never retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use warden_auth::{AuthError, RefreshDigest, SessionError, SessionSnapshot};
use warden_core::SessionRef;

use crate::kv::{KeyValueStore, StoreError};

pub const SESSION_PREFIX: &str = "session:";
pub const REFRESH_PREFIX: &str = "rt:";

pub fn session_key(session_ref: &SessionRef) -> String {
    format!("{SESSION_PREFIX}{session_ref}")
}

pub fn refresh_key(digest: &RefreshDigest) -> String {
    format!("{REFRESH_PREFIX}{digest}")
}

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    op_timeout: Duration,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, op_timeout: Duration) -> Self {
        Self { kv, op_timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                warn!(op, error = %e, "store round-trip failed");
                Err(e.into())
            }
            Err(_) => {
                let timeout_ms = self.op_timeout.as_millis() as u64;
                warn!(op, timeout_ms, "store round-trip timed out");
                Err(StoreError::Timeout.into())
            }
        }
    }

    pub async fn put(
        &self,
        session_ref: &SessionRef,
        snapshot: &SessionSnapshot,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| AuthError::internal(format!("session encoding: {e}")))?;
        self.bounded("session_put", self.kv.set(&session_key(session_ref), &json, ttl))
            .await
    }

    /// Absent or empty ⇒ `Session(NotFound)`; undecodable ⇒ `Session(Corrupt)`.
    pub async fn load(&self, session_ref: &SessionRef) -> Result<SessionSnapshot, AuthError> {
        let raw = self
            .bounded("session_get", self.kv.get(&session_key(session_ref)))
            .await?
            .filter(|s| !s.is_empty())
            .ok_or(SessionError::NotFound)?;

        serde_json::from_str(&raw).map_err(|e| {
            warn!(%session_ref, error = %e, "undecodable session snapshot");
            AuthError::Session(SessionError::Corrupt)
        })
    }

    /// Reset the session TTL. `false` if the session has already lapsed.
    pub async fn extend(&self, session_ref: &SessionRef, ttl: Duration) -> Result<bool, AuthError> {
        self.bounded("session_expire", self.kv.expire(&session_key(session_ref), ttl))
            .await
    }

    pub async fn remove(&self, session_ref: &SessionRef) -> Result<bool, AuthError> {
        self.bounded("session_del", self.kv.del(&session_key(session_ref)))
            .await
    }

    pub async fn put_pointer(
        &self,
        digest: &RefreshDigest,
        session_ref: &SessionRef,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        self.bounded(
            "refresh_put",
            self.kv.set(&refresh_key(digest), session_ref.as_str(), ttl),
        )
        .await
    }

    /// Atomically resolve and consume a refresh pointer.
    ///
    /// A pointer whose value is not a well-formed session ref is consumed and
    /// reported as absent.
    pub async fn take_pointer(
        &self,
        digest: &RefreshDigest,
    ) -> Result<Option<SessionRef>, AuthError> {
        let raw = self
            .bounded("refresh_take", self.kv.take(&refresh_key(digest)))
            .await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    /// Delete every refresh pointer that targets `session_ref`.
    ///
    /// O(all pointers). Pointers that vanish between scan and read are skipped.
    pub async fn purge_pointers(&self, session_ref: &SessionRef) -> Result<usize, AuthError> {
        let keys = self
            .bounded("refresh_scan", self.kv.scan_prefix(REFRESH_PREFIX))
            .await?;

        let mut purged = 0;
        for key in keys {
            let target = self.bounded("refresh_get", self.kv.get(&key)).await?;
            if target.as_deref() == Some(session_ref.as_str())
                && self.bounded("refresh_del", self.kv.del(&key)).await?
            {
                purged += 1;
            }
        }
        Ok(purged)
    }
}
