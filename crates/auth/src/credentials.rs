//! Password verification.
//!
//! The hashing policy is a collaborator decision; the session protocol only
//! needs something that can say "this secret matches this stored hash".

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, Version};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::AuthError;

/// Checks a presented secret against a stored one-way hash.
///
/// Implementations must be slow and salted. They are called off the async
/// runtime (on a blocking thread), so they may burn CPU freely.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, presented: &str, stored_hash: &str) -> bool;

    /// Spend the effort of one [`Self::verify`] when there is no stored hash,
    /// so an unknown identity costs as much as a wrong secret.
    fn verify_absent(&self, presented: &str) {
        let _ = presented;
    }
}

/// Argon2id with PHC-formatted hashes.
///
/// Verification reads the cost parameters from the stored hash, so hashes
/// produced with different costs remain verifiable.
#[derive(Debug, Clone)]
pub struct Argon2Passwords {
    params: Params,
    decoy: String,
}

impl Default for Argon2Passwords {
    fn default() -> Self {
        Self::from_params(Params::default())
    }
}

impl Argon2Passwords {
    /// Custom cost (memory in KiB, iterations). Mostly useful to keep test
    /// fixtures fast.
    pub fn with_cost(m_cost_kib: u32, t_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost_kib, t_cost, 1, None)
            .map_err(|e| AuthError::internal(format!("argon2 params: {e}")))?;
        Ok(Self::from_params(params))
    }

    fn from_params(params: Params) -> Self {
        let mut passwords = Self {
            params,
            decoy: String::new(),
        };
        // Empty decoy only loses the timing cover; verification still fails.
        passwords.decoy = passwords.hash("decoy").unwrap_or_default();
        passwords
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext secret with a fresh random salt.
    pub fn hash(&self, plain: &str) -> Result<String, AuthError> {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| AuthError::internal(format!("salt encoding: {e}")))?;

        self.hasher()
            .hash_password(plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::internal(format!("password hashing: {e}")))
    }
}

impl PasswordVerifier for Argon2Passwords {
    fn verify(&self, presented: &str, stored_hash: &str) -> bool {
        use argon2::PasswordVerifier as _;

        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        self.hasher()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    }

    fn verify_absent(&self, presented: &str) {
        let _ = PasswordVerifier::verify(self, presented, &self.decoy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Passwords {
        Argon2Passwords::with_cost(64, 1).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_secret() {
        let passwords = cheap();
        let stored = passwords.hash("P@ssw0rd").unwrap();

        assert!(stored.starts_with("$argon2id$"));
        assert!(passwords.verify("P@ssw0rd", &stored));
        assert!(!passwords.verify("p@ssw0rd", &stored));
        assert!(!passwords.verify("", &stored));
    }

    #[test]
    fn same_secret_hashes_differently() {
        let passwords = cheap();
        assert_ne!(passwords.hash("x").unwrap(), passwords.hash("x").unwrap());
    }

    #[test]
    fn unparseable_stored_hash_never_matches() {
        assert!(!cheap().verify("P@ssw0rd", "P@ssw0rd"));
        assert!(!cheap().verify("anything", ""));
    }

    #[test]
    fn decoy_is_a_real_hash_at_the_configured_cost() {
        let passwords = Argon2Passwords::with_cost(128, 2).unwrap();
        assert!(passwords.decoy.starts_with("$argon2id$v=19$m=128,t=2,p=1$"));
        assert!(!passwords.verify("P@ssw0rd", &passwords.decoy));
    }

    #[test]
    fn default_cost_verifies_cheap_hashes() {
        let stored = cheap().hash("P@ssw0rd").unwrap();
        assert!(Argon2Passwords::default().verify("P@ssw0rd", &stored));
    }
}
