//! One-time refresh secrets.
//!
//! Only the SHA-256 digest of a secret is ever handed to storage, so a dump
//! of the store does not yield usable refresh secrets.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Entropy of a freshly minted secret.
pub const REFRESH_SECRET_BYTES: usize = 32;

/// Opaque refresh secret as handed to (or presented by) the client.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    /// Mint a new secret: 32 bytes from the OS RNG, base64url without padding.
    pub fn generate() -> Self {
        let mut bytes = [0u8; REFRESH_SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a secret presented by a client. No validation: an unknown secret
    /// simply has no pointer in the store.
    pub fn presented(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn digest(&self) -> RefreshDigest {
        RefreshDigest(hex::encode(Sha256::digest(self.0.as_bytes())))
    }
}

impl core::fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}

/// Lowercase hex SHA-256 of a refresh secret; the storage-side index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshDigest(String);

impl RefreshDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RefreshDigest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_url_safe_and_unique() {
        let a = RefreshSecret::generate();
        let b = RefreshSecret::generate();

        assert_ne!(a, b);
        assert_eq!(a.expose().len(), 43);
        assert!(
            a.expose()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn digest_is_stable_sha256_hex() {
        let secret = RefreshSecret::presented("abc");
        assert_eq!(
            secret.digest().as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(secret.digest(), RefreshSecret::presented("abc").digest());
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let secret = RefreshSecret::presented("super-secret-value");
        assert!(!format!("{secret:?}").contains("super-secret-value"));
    }
}
