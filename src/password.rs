//! Password hashing and verification using bcrypt.
//!
//! Hashes are self-describing (`$2b$<cost>$<salt><digest>`), so the salt and
//! work factor travel with the stored value.

use crate::error::{AuthError, AuthResult};

/// Work factor used when none is configured.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a password with a fresh random salt at [`DEFAULT_COST`].
pub fn hash_password(password: &str) -> AuthResult<String> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Hash a password with a fresh random salt at the given cost.
pub fn hash_password_with_cost(password: &str, cost: u32) -> AuthResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash.
///
/// A mismatch yields [`AuthError::AuthenticationFailed`]. A stored hash that
/// cannot be parsed is a data problem, not a bad guess, and yields
/// [`AuthError::Internal`].
pub fn verify_password(password: &str, hash: &str) -> AuthResult<()> {
    match bcrypt::verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::AuthenticationFailed),
        Err(e) => Err(AuthError::Internal(format!(
            "Invalid password hash format: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the tests fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password_with_cost(password, TEST_COST).unwrap();

        assert!(hash.starts_with("$2"));
        assert!(verify_password(password, &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-password", &hash),
            Err(AuthError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_different_salts() {
        let password = "secret1";
        let hash1 = hash_password_with_cost(password, TEST_COST).unwrap();
        let hash2 = hash_password_with_cost(password, TEST_COST).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).is_ok());
        assert!(verify_password(password, &hash2).is_ok());
    }

    #[test]
    fn test_cost_is_embedded() {
        let hash = hash_password_with_cost("secret1", 5).unwrap();
        assert!(hash.contains("$05$"));
    }

    #[test]
    fn test_invalid_cost() {
        assert!(matches!(
            hash_password_with_cost("secret1", 2),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(matches!(
            verify_password("password", "not-a-valid-hash"),
            Err(AuthError::Internal(_))
        ));
    }
}
