//! Strongly-typed identifiers used across the workspace.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Stable identifier of an identity record (owned by the identity directory).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(Uuid);

impl IdentityId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for IdentityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for IdentityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("IdentityId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Longest session reference accepted from the outside.
pub const MAX_SESSION_REF_LEN: usize = 128;

/// Opaque, unguessable reference to a stored session snapshot.
///
/// Freshly minted references are random (UUIDv4, 122 bits from the OS RNG).
/// References parsed from a token subject are only checked for shape; whether
/// they point at a live session is the session store's call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRef(String);

impl SessionRef {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for SessionRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DomainError::invalid_id("SessionRef: empty"));
        }
        if s.len() > MAX_SESSION_REF_LEN {
            return Err(DomainError::invalid_id("SessionRef: too long"));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::invalid_id("SessionRef: contains whitespace"));
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_session_refs_are_distinct() {
        let a = SessionRef::generate();
        let b = SessionRef::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().parse::<SessionRef>().unwrap(), a);
    }

    #[test]
    fn session_ref_rejects_empty_and_whitespace() {
        assert!("".parse::<SessionRef>().is_err());
        assert!("abc def".parse::<SessionRef>().is_err());
        assert!("x".repeat(MAX_SESSION_REF_LEN + 1).parse::<SessionRef>().is_err());
    }

    #[test]
    fn identity_id_parse_reports_type() {
        let err = "not-a-uuid".parse::<IdentityId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("IdentityId")));
    }

    proptest! {
        #[test]
        fn session_ref_with_inner_space_is_rejected(a in "[a-z0-9]{1,20}", b in "[a-z0-9]{1,20}") {
            let candidate = format!("{a} {b}");
            prop_assert!(candidate.parse::<SessionRef>().is_err());
        }
    }
}
