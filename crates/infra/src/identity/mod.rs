//! Identity lookup boundary and the credential verifier built on it.
//!
//! Identity records are owned elsewhere; this layer only reads them.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use warden_auth::{AuthError, PasswordVerifier, PermissionSet, Role};
use warden_core::IdentityId;

pub use in_memory::InMemoryIdentityDirectory;
pub use postgres::PostgresIdentityDirectory;

/// Stored identity as seen by the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub email: String,
    pub hashed_secret: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity not found")]
    NotFound,

    #[error("identity backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<IdentityRecord, IdentityError>;

    /// Permission codes granted to the identity through its role.
    async fn permissions_for(&self, id: IdentityId) -> Result<PermissionSet, IdentityError>;
}

/// Identity that passed a credential check, with its permission snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub record: IdentityRecord,
    pub permissions: PermissionSet,
}

/// Checks an identifier + secret pair against the directory.
///
/// Unknown identifier, inactive identity and wrong secret all collapse into
/// [`AuthError::CredentialInvalid`].
#[derive(Clone)]
pub struct CredentialVerifier {
    directory: Arc<dyn IdentityDirectory>,
    passwords: Arc<dyn PasswordVerifier>,
}

impl CredentialVerifier {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        passwords: Arc<dyn PasswordVerifier>,
    ) -> Self {
        Self {
            directory,
            passwords,
        }
    }

    #[instrument(skip_all)]
    pub async fn verify(&self, email: &str, secret: &str) -> Result<VerifiedIdentity, AuthError> {
        let record = match self.directory.get_by_email(email).await {
            Ok(record) if record.active => Some(record),
            Ok(_) | Err(IdentityError::NotFound) => None,
            Err(IdentityError::Backend(e)) => return Err(AuthError::store(e)),
        };

        // Hash comparison is deliberately slow; keep it off the async workers.
        // A missing identity still pays for one comparison.
        let passwords = self.passwords.clone();
        let presented = secret.to_string();
        let stored = record.as_ref().map(|r| r.hashed_secret.clone());
        let matches = tokio::task::spawn_blocking(move || match stored {
            Some(stored) => passwords.verify(&presented, &stored),
            None => {
                passwords.verify_absent(&presented);
                false
            }
        })
        .await
        .map_err(|e| AuthError::internal(format!("password check aborted: {e}")))?;

        let record = match record {
            Some(record) if matches => record,
            Some(record) => {
                tracing::debug!(identity_id = %record.id, "password mismatch");
                return Err(AuthError::CredentialInvalid);
            }
            None => return Err(AuthError::CredentialInvalid),
        };

        let permissions = self
            .directory
            .permissions_for(record.id)
            .await
            .map_err(|e| match e {
                IdentityError::NotFound => AuthError::CredentialInvalid,
                IdentityError::Backend(msg) => AuthError::store(msg),
            })?;

        Ok(VerifiedIdentity {
            record,
            permissions,
        })
    }
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use warden_auth::{Argon2Passwords, Permission};

    fn setup() -> (CredentialVerifier, Arc<InMemoryIdentityDirectory>) {
        let passwords = Argon2Passwords::with_cost(64, 1).unwrap();
        let directory = Arc::new(InMemoryIdentityDirectory::new());

        directory.insert(
            IdentityRecord {
                id: IdentityId::new(),
                email: "a@b.com".to_string(),
                hashed_secret: passwords.hash("P@ssw0rd").unwrap(),
                role: Role::new("interviewer"),
                active: true,
            },
            [Permission::from("comment_view")].into_iter().collect(),
        );
        directory.insert(
            IdentityRecord {
                id: IdentityId::new(),
                email: "gone@b.com".to_string(),
                hashed_secret: passwords.hash("P@ssw0rd").unwrap(),
                role: Role::new("interviewer"),
                active: false,
            },
            PermissionSet::new(),
        );

        let verifier = CredentialVerifier::new(directory.clone(), Arc::new(passwords));
        (verifier, directory)
    }

    #[tokio::test]
    async fn correct_secret_returns_permission_snapshot() {
        let (verifier, _) = setup();
        let verified = verifier.verify("a@b.com", "P@ssw0rd").await.unwrap();

        assert_eq!(verified.record.email, "a@b.com");
        assert!(verified.permissions.contains(&Permission::from("comment_view")));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_secret_look_the_same() {
        let (verifier, _) = setup();

        let unknown = verifier.verify("nobody@b.com", "P@ssw0rd").await.unwrap_err();
        let wrong = verifier.verify("a@b.com", "nope").await.unwrap_err();
        let inactive = verifier.verify("gone@b.com", "P@ssw0rd").await.unwrap_err();

        assert_eq!(unknown, AuthError::CredentialInvalid);
        assert_eq!(wrong, AuthError::CredentialInvalid);
        assert_eq!(inactive, AuthError::CredentialInvalid);
    }

    /// Counts comparisons instead of hashing.
    #[derive(Default)]
    struct CountingPasswords {
        real: AtomicUsize,
        absent: AtomicUsize,
    }

    impl PasswordVerifier for CountingPasswords {
        fn verify(&self, presented: &str, stored_hash: &str) -> bool {
            self.real.fetch_add(1, Ordering::SeqCst);
            presented == stored_hash
        }

        fn verify_absent(&self, _: &str) {
            self.absent.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn every_failed_login_pays_for_one_comparison() {
        let (_, directory) = setup();
        let passwords = Arc::new(CountingPasswords::default());
        let verifier = CredentialVerifier::new(directory, passwords.clone());

        for email in ["nobody@b.com", "gone@b.com"] {
            assert_eq!(
                verifier.verify(email, "P@ssw0rd").await.unwrap_err(),
                AuthError::CredentialInvalid
            );
        }
        verifier.verify("a@b.com", "nope").await.unwrap_err();

        assert_eq!(passwords.absent.load(Ordering::SeqCst), 2);
        assert_eq!(passwords.real.load(Ordering::SeqCst), 1);
    }

    struct BrokenDirectory;

    #[async_trait]
    impl IdentityDirectory for BrokenDirectory {
        async fn get_by_email(&self, _: &str) -> Result<IdentityRecord, IdentityError> {
            Err(IdentityError::Backend("connection reset".to_string()))
        }

        async fn permissions_for(&self, _: IdentityId) -> Result<PermissionSet, IdentityError> {
            Err(IdentityError::Backend("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn backend_failure_is_transient() {
        let verifier = CredentialVerifier::new(
            Arc::new(BrokenDirectory),
            Arc::new(Argon2Passwords::with_cost(64, 1).unwrap()),
        );
        let err = verifier.verify("a@b.com", "P@ssw0rd").await.unwrap_err();
        assert!(err.is_transient());
    }
}
