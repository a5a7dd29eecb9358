//! Infrastructure layer: key-value store, identity lookup, session protocol,
//! rate limiting and configuration.

pub mod config;
pub mod identity;
pub mod kv;
pub mod rate_limit;
pub mod session;

pub use config::{AppConfig, AuthConfig, ConfigError, RateLimitConfig, load_key_material};
pub use identity::{CredentialVerifier, IdentityDirectory, IdentityError, IdentityRecord};
pub use kv::{InMemoryKvStore, KeyValueStore, StoreError};
pub use rate_limit::{Admission, BucketKey, BucketPolicy, RateLimiter, SweeperHandle};
pub use session::{IssuedTokens, SessionService, SessionStore};
