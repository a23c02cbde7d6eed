//! Cryptographic primitives for session tokens and credentials.
//!
//! Session and magic-link tokens are opaque bearer values: 32 random bytes,
//! hex encoded. Only the SHA-256 digest of a token is ever persisted; the raw
//! value is handed to the caller exactly once. The random token space carries
//! the entropy guarantee, the digest is just the lookup key.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random bearer token and the digest under which it is stored.
pub fn generate_token() -> (String, String) {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    let raw = hex::encode(bytes);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// Hash a token for storage or lookup. Deterministic and one-way.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
/// Mismatch and malformed hashes both return false; raw strings are never compared.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_deterministic() {
        let (raw, hash) = generate_token();
        assert_eq!(hash_token(&raw), hash);
        assert_eq!(hash_token(&raw), hash_token(&raw));
    }

    #[test]
    fn test_tokens_are_unique_and_opaque() {
        let (raw_a, hash_a) = generate_token();
        let (raw_b, hash_b) = generate_token();
        assert_ne!(raw_a, raw_b);
        assert_ne!(hash_a, hash_b);
        // 32 bytes hex encoded
        assert_eq!(raw_a.len(), 64);
        assert_ne!(raw_a, hash_a);
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2-but-longer").unwrap();
        assert!(verify_password("hunter2-but-longer", &hash));
        assert!(!verify_password("hunter2-but-wrong", &hash));
    }

    #[test]
    fn test_malformed_stored_hash_is_rejected_quietly() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }
}
