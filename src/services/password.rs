// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Salted password hashing and one-time reset tokens for the local stores.
//!
//! Hashes are PBKDF2-HMAC-SHA256 encoded as
//! `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>`, so the work factor
//! can be raised without invalidating existing entries.

use crate::error::AuthError;
use base64::{
    engine::general_purpose::{STANDARD_NO_PAD as B64, URL_SAFE_NO_PAD},
    Engine as _,
};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = digest::SHA256_OUTPUT_LEN;
const RESET_TOKEN_BYTES: usize = 32;

/// Password hasher shared by the local credential stores.
#[derive(Clone)]
pub struct PasswordHasher {
    rng: SystemRandom,
    iterations: NonZeroU32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Result<Self, AuthError> {
        let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!("PBKDF2 iterations must be non-zero"))
        })?;
        Ok(Self {
            rng: SystemRandom::new(),
            iterations,
        })
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AuthError::Internal(anyhow::anyhow!("Secure random unavailable")))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            B64.encode(salt),
            B64.encode(hash)
        ))
    }

    /// Check `password` against an encoded hash. Malformed hashes never match.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((iterations, salt, hash)) = parse_encoded(encoded) else {
            tracing::warn!("Stored password hash is malformed");
            return false;
        };
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            password.as_bytes(),
            &hash,
        )
        .is_ok()
    }

    /// [`hash`](Self::hash) on the blocking pool, off the async workers.
    pub async fn hash_async(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool, off the async workers.
    pub async fn verify_async(&self, password: &str, encoded: &str) -> Result<bool, AuthError> {
        let hasher = self.clone();
        let password = password.to_string();
        let encoded = encoded.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password check task failed: {}", e)))
    }

    /// Create a one-time reset token. Returns `(token, digest)`; only the
    /// digest is ever persisted.
    pub fn issue_reset_token(&self) -> Result<(String, String), AuthError> {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::Internal(anyhow::anyhow!("Secure random unavailable")))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let digest = token_digest(&token);
        Ok((token, digest))
    }
}

/// Hex SHA-256 digest of a reset token.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time comparison of a presented token against a stored digest.
pub fn token_matches(token: &str, stored_digest: &str) -> bool {
    let presented = token_digest(token);
    presented.as_bytes().ct_eq(stored_digest.as_bytes()).into()
}

fn parse_encoded(encoded: &str) -> Option<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let mut parts = encoded.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations = parts.next()?.parse::<NonZeroU32>().ok()?;
    let salt = B64.decode(parts.next()?).ok()?;
    let hash = B64.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.len() != HASH_LEN {
        return None;
    }
    Some((iterations, salt, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_right_password() {
        let hasher = hasher();
        let encoded = hasher.hash("secret1").unwrap();
        assert!(encoded.starts_with("pbkdf2-sha256$1000$"));
        assert!(!encoded.contains("secret1"));
        assert!(hasher.verify("secret1", &encoded));
        assert!(!hasher.verify("secret2", &encoded));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pw1234").unwrap(), hasher.hash("pw1234").unwrap());
    }

    #[test]
    fn verify_honours_stored_iteration_count() {
        let old = PasswordHasher::new(500).unwrap();
        let encoded = old.hash("legacy").unwrap();
        assert!(hasher().verify("legacy", &encoded));
    }

    #[test]
    fn malformed_hash_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify("pw", "pw"));
        assert!(!hasher.verify("pw", "pbkdf2-sha256$0$AAAA$AAAA"));
        assert!(!hasher.verify("pw", "bcrypt$10$x$y"));
    }

    #[test]
    fn reset_token_matches_its_digest_only() {
        let (token, digest) = hasher().issue_reset_token().unwrap();
        assert!(token_matches(&token, &digest));
        assert!(!token_matches("guess", &digest));
        assert!(!token.contains('+') && !token.contains('/'));
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree_with_sync_ones() {
        let hasher = hasher();
        let encoded = hasher.hash_async("secret1").await.unwrap();
        assert!(hasher.verify("secret1", &encoded));
        assert!(hasher.verify_async("secret1", &encoded).await.unwrap());
        assert!(!hasher.verify_async("secret2", &encoded).await.unwrap());
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(PasswordHasher::new(0).is_err());
    }
}
