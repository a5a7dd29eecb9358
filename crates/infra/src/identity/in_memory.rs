use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_auth::PermissionSet;
use warden_core::IdentityId;

use super::{IdentityDirectory, IdentityError, IdentityRecord};

#[derive(Debug, Default)]
struct Inner {
    by_email: HashMap<String, IdentityRecord>,
    permissions: HashMap<IdentityId, PermissionSet>,
}

/// In-memory identity directory.
///
/// Intended for tests/dev. Emails are matched exactly.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    inner: RwLock<Inner>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an identity together with its granted permissions.
    pub fn insert(&self, record: IdentityRecord, permissions: PermissionSet) {
        let mut inner = self.write();
        inner.permissions.insert(record.id, permissions);
        inner.by_email.insert(record.email.clone(), record);
    }

    /// Replace the permissions of an existing identity. Sessions already
    /// issued keep their snapshot.
    pub fn set_permissions(&self, id: IdentityId, permissions: PermissionSet) {
        self.write().permissions.insert(id, permissions);
    }

    // Every write leaves both maps consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn get_by_email(&self, email: &str) -> Result<IdentityRecord, IdentityError> {
        self.read()
            .by_email
            .get(email)
            .cloned()
            .ok_or(IdentityError::NotFound)
    }

    async fn permissions_for(&self, id: IdentityId) -> Result<PermissionSet, IdentityError> {
        Ok(self.read().permissions.get(&id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use warden_auth::{Permission, Role};

    fn record(email: &str) -> IdentityRecord {
        IdentityRecord {
            id: IdentityId::new(),
            email: email.to_string(),
            hashed_secret: "$argon2id$unused".to_string(),
            role: Role::new("interviewer"),
            active: true,
        }
    }

    #[tokio::test]
    async fn writes_survive_a_poisoned_lock() {
        let directory = Arc::new(InMemoryIdentityDirectory::new());
        let poisoner = directory.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(directory.inner.is_poisoned());

        let rec = record("a@b.com");
        let id = rec.id;
        directory.insert(rec, PermissionSet::new());
        directory.set_permissions(id, [Permission::from("card_view")].into_iter().collect());

        assert_eq!(directory.get_by_email("a@b.com").await.unwrap().id, id);
        assert!(
            directory
                .permissions_for(id)
                .await
                .unwrap()
                .contains(&Permission::from("card_view"))
        );
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let directory = InMemoryIdentityDirectory::new();
        directory.insert(record("a@b.com"), PermissionSet::new());
        assert_eq!(
            directory.get_by_email("A@b.com").await.unwrap_err(),
            IdentityError::NotFound
        );
    }
}
