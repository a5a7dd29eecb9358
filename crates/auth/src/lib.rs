//! `warden-auth` — pure authentication/authorization boundary.
//!
//! Token signing and verification, refresh-secret minting, password checks and
//! permission matching. This crate is intentionally decoupled from HTTP and
//! storage: nothing here performs IO beyond reading the OS random source.

pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod error;
pub mod permissions;
pub mod principal;
pub mod refresh;
pub mod roles;
pub mod token;

pub use authorize::authorize;
pub use claims::{AccessClaims, ISSUER, UnverifiedClaims, validate_claims};
pub use credentials::{Argon2Passwords, PasswordVerifier};
pub use error::{AuthError, RefreshError, SessionError, TokenError};
pub use permissions::{Permission, PermissionSet};
pub use principal::{IdentityContext, SessionSnapshot};
pub use refresh::{RefreshDigest, RefreshSecret};
pub use roles::Role;
pub use token::{KeyMaterial, KeyMaterialError, TokenIssuer, TokenVerifier};
