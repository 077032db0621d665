//! Credential generation and the secret hashing collaborator.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Characters used for generated credentials. Visually ambiguous glyphs
/// (`i`, `l`, `o`, `I`, `O`, `0`, `1`) are left out because the value is read
/// off a terminal by an operator.
pub const CREDENTIAL_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Inclusive length range for generated credentials.
pub const CREDENTIAL_LENGTH: RangeInclusive<usize> = 19..=28;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HashError(pub String);

/// "Set secret" / "verify secret" collaborator.
pub trait SecretHasher: Send + Sync {
    /// Hash a raw credential into an opaque, storable value.
    ///
    /// # Errors
    /// Returns `HashError` if salt generation or hashing fails.
    fn set_secret(&self, raw: &SecretString) -> Result<SecretString, HashError>;

    /// Check a raw credential against a stored hash.
    fn verify_secret(&self, raw: &SecretString, hashed: &SecretString) -> bool;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SecretHasher for Argon2Hasher {
    fn set_secret(&self, raw: &SecretString) -> Result<SecretString, HashError> {
        let mut salt_bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| HashError(format!("failed to generate salt: {e}")))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError(e.to_string()))?;
        let phc = Argon2::default()
            .hash_password(raw.expose_secret().as_bytes(), &salt)
            .map_err(|e| HashError(e.to_string()))?
            .to_string();
        Ok(SecretString::from(phc))
    }

    fn verify_secret(&self, raw: &SecretString, hashed: &SecretString) -> bool {
        PasswordHash::new(hashed.expose_secret()).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(raw.expose_secret().as_bytes(), &parsed)
                .is_ok()
        })
    }
}

/// Generate a random credential with a length drawn uniformly from
/// [`CREDENTIAL_LENGTH`].
#[must_use]
pub fn generate_credential() -> SecretString {
    let mut rng = OsRng;
    let length = rng.gen_range(CREDENTIAL_LENGTH);
    let credential: String = (0..length)
        .map(|_| {
            let index = rng.gen_range(0..CREDENTIAL_ALPHABET.len());
            char::from(CREDENTIAL_ALPHABET[index])
        })
        .collect();
    SecretString::from(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_length_in_range() {
        for _ in 0..200 {
            let credential = generate_credential();
            let len = credential.expose_secret().chars().count();
            assert!(
                CREDENTIAL_LENGTH.contains(&len),
                "length {len} out of range"
            );
            assert!(credential
                .expose_secret()
                .bytes()
                .all(|b| CREDENTIAL_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn generated_values_differ() {
        let a = generate_credential();
        let b = generate_credential();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn argon2_round_trip() {
        let hasher = Argon2Hasher::new();
        let raw = SecretString::from("correct horse battery staple".to_string());
        let hashed = hasher.set_secret(&raw).expect("hash");

        assert!(hashed.expose_secret().starts_with("$argon2"));
        assert!(hasher.verify_secret(&raw, &hashed));
        assert!(!hasher.verify_secret(&SecretString::from("wrong".to_string()), &hashed));
        assert!(!hasher.verify_secret(&raw, &SecretString::from("not-a-phc".to_string())));
    }
}
