use crate::{AuthError, IdentityContext, Permission};

/// Authorize an authenticated identity for a single permission code.
///
/// - No IO
/// - No panics
/// - Exact string membership against the session's permission snapshot
pub fn authorize(identity: &IdentityContext, required: &Permission) -> Result<(), AuthError> {
    if identity.has_permission(required) {
        Ok(())
    } else {
        tracing::debug!(
            session_ref = %identity.session_ref(),
            required = %required,
            "permission denied"
        );
        Err(AuthError::Forbidden(required.clone()))
    }
}
