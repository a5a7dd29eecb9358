//! Postgres-backed identity directory.
//!
//! Reads the `users`, `roles`, `role_permissions` and `permissions` tables.
//! Inactive rows at any level are invisible: an inactive user is not found, and
//! a permission reaches a user only if the role, the grant and the permission
//! itself are all active.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use warden_auth::{Permission, PermissionSet, Role};
use warden_core::IdentityId;

use super::{IdentityDirectory, IdentityError, IdentityRecord};

const SELECT_BY_EMAIL: &str = r#"
    SELECT u.id, u.email, u.password, r.code AS role_code, u.is_active
    FROM users u
    JOIN roles r ON r.id = u.role_id
    WHERE u.email = $1 AND u.is_active = true
    LIMIT 1
"#;

const SELECT_PERMISSIONS: &str = r#"
    SELECT p.code
    FROM users u
    JOIN roles r ON r.id = u.role_id AND r.is_active = true
    JOIN role_permissions rp ON rp.role_id = r.id AND rp.is_active = true
    JOIN permissions p ON p.id = rp.permission_id AND p.is_active = true
    WHERE u.id = $1 AND u.is_active = true
"#;

#[derive(Debug, Clone)]
pub struct PostgresIdentityDirectory {
    pool: PgPool,
}

impl PostgresIdentityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, IdentityError> {
        let pool = PgPool::connect(database_url).await.map_err(backend)?;
        Ok(Self::new(pool))
    }
}

fn backend(e: sqlx::Error) -> IdentityError {
    IdentityError::Backend(e.to_string())
}

#[async_trait]
impl IdentityDirectory for PostgresIdentityDirectory {
    async fn get_by_email(&self, email: &str) -> Result<IdentityRecord, IdentityError> {
        let row = sqlx::query(SELECT_BY_EMAIL)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(IdentityError::NotFound)?;

        let id: Uuid = row.try_get("id").map_err(backend)?;
        let role_code: String = row.try_get("role_code").map_err(backend)?;

        Ok(IdentityRecord {
            id: IdentityId::from_uuid(id),
            email: row.try_get("email").map_err(backend)?,
            hashed_secret: row.try_get("password").map_err(backend)?,
            role: Role::new(role_code),
            active: row.try_get("is_active").map_err(backend)?,
        })
    }

    async fn permissions_for(&self, id: IdentityId) -> Result<PermissionSet, IdentityError> {
        let rows = sqlx::query(SELECT_PERMISSIONS)
            .bind(*id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("code")
                    .map(Permission::from)
                    .map_err(backend)
            })
            .collect()
    }
}
