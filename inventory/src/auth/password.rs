use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::database::DatabaseError;

/// Argon2id hash in PHC string format
pub fn hash_password(password: &str) -> Result<String, DatabaseError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DatabaseError::InvalidData(format!("Failed to hash password: {}", e)))
}

/// A malformed stored hash never verifies
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

/// Burns the same work as a real verification so unknown emails and wrong
/// passwords take comparable time.
pub fn verify_against_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY_HASH.get_or_init(|| hash_password("not-a-real-password").ok()) {
        let _ = verify_password(password, hash);
    }
}

/// [`hash_password`] on the blocking pool
pub async fn spawn_hash(password: &str) -> Result<String, DatabaseError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DatabaseError::InvalidData(format!("Password hashing task failed: {}", e)))?
}

/// Verification on the blocking pool. Without a stored hash the dummy is
/// checked instead and the result is always `false`.
pub async fn spawn_verify(password: &str, stored_hash: Option<String>) -> bool {
    let password = password.to_string();
    let outcome = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_against_dummy(&password);
            false
        }
    })
    .await;

    outcome.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Password verification task failed");
        false
    })
}
