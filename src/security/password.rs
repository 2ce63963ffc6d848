use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::error::ApiError;

/// Hash a password with Argon2id defaults. Returns a PHC-format string.
///
/// Argon2 is deliberately slow, so the work runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| ApiError::PasswordHash(e.to_string()))?
}

/// Check `password` against a stored PHC hash. A malformed hash is an error,
/// a mismatch is `Ok(false)`.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(|e| ApiError::PasswordHash(e.to_string()))?
}

fn hash_blocking(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::PasswordHash(e.to_string()))
}

fn verify_blocking(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ApiError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").await.is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_does_not_hold_the_runtime_thread() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let log = order.clone();
        let hashing = tokio::spawn(async move {
            hash_password("correct horse").await.unwrap();
            log.lock().unwrap().push("hash");
        });
        let log = order.clone();
        let other = tokio::spawn(async move {
            log.lock().unwrap().push("other");
        });
        other.await.unwrap();
        hashing.await.unwrap();
        assert_eq!(*order.lock().unwrap(), ["other", "hash"]);
    }
}
