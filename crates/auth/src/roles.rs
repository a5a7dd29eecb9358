use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role code of an identity (e.g. `"admin"`, `"interviewer"`).
///
/// Carried in the session snapshot for display and auditing only. Access
/// decisions never look at the role; they use the permission snapshot taken
/// from the role at login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
