//! Key-value store boundary.
//!
//! The session protocol only needs a handful of string commands with per-key
//! TTLs. Adapters own their connection handling; callers own timeouts.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use warden_auth::AuthError;

pub use in_memory::InMemoryKvStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisKvStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("store round-trip timed out")]
    Timeout,
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::store(e.to_string())
    }
}

/// Minimal string key-value contract with automatic per-key expiry.
///
/// Every method is a single round-trip. `take` must be atomic: two concurrent
/// `take`s of the same key yield the value to at most one of them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Read and delete in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns whether the key existed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Reset the TTL of an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
