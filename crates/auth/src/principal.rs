use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{IdentityId, SessionRef};

use crate::{Permission, PermissionSet, Role};

/// Stored session state, as serialized under `session:<ref>`.
///
/// A point-in-time snapshot taken at login. Refresh extends its TTL but never
/// rewrites it, so permission changes only apply from the next login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: IdentityId,
    pub email: String,
    pub role: Role,
    pub perms: PermissionSet,
    pub created_at: DateTime<Utc>,
}

/// Validated identity attached to a request after authentication.
///
/// Passed explicitly to handlers (request extension / extractor), never looked
/// up from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityContext {
    session_ref: SessionRef,
    identity_id: IdentityId,
    email: String,
    role: Role,
    permissions: PermissionSet,
}

impl IdentityContext {
    pub fn from_snapshot(session_ref: SessionRef, snapshot: SessionSnapshot) -> Self {
        Self {
            session_ref,
            identity_id: snapshot.user_id,
            email: snapshot.email,
            role: snapshot.role,
            permissions: snapshot.perms,
        }
    }

    pub fn session_ref(&self) -> &SessionRef {
        &self.session_ref
    }

    pub fn identity_id(&self) -> IdentityId {
        self.identity_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}
