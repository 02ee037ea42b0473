//! Input validation for credentials supplied in request bodies.
//!
//! Validation runs before any hashing or persistence, so a rejected request
//! writes nothing.

use crate::error::{AuthError, AuthResult};
use crate::{MAX_EMAIL_LENGTH, MAX_PASSWORD_BYTES};

/// Validate an email address.
///
/// Only the shape is checked: one `@` separating a non-empty local part from
/// a domain with at least one dot, no whitespace, at most 254 characters.
///
/// # Examples
///
/// ```rust
/// use chirpy_auth::validate_email;
///
/// assert!(validate_email("a@x.com").is_ok());
///
/// assert!(validate_email("no-at-sign.com").is_err());
/// assert!(validate_email("").is_err());
/// ```
pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.is_empty() {
        return Err(AuthError::InvalidInput(
            "Email cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Email exceeds maximum length of {} characters",
            MAX_EMAIL_LENGTH
        )));
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::InvalidInput(
            "Email cannot contain whitespace".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidInput(
            "Email must contain '@'".to_string(),
        ));
    };

    if local.is_empty() {
        return Err(AuthError::InvalidInput(
            "Email local part cannot be empty".to_string(),
        ));
    }

    if domain.contains('@') {
        return Err(AuthError::InvalidInput(
            "Email must contain exactly one '@'".to_string(),
        ));
    }

    if domain.split('.').count() < 2 || domain.split('.').any(str::is_empty) {
        return Err(AuthError::InvalidInput(
            "Email domain is malformed".to_string(),
        ));
    }

    Ok(())
}

/// Validate a plaintext password.
///
/// bcrypt only reads the first 72 bytes of its input, so longer passwords are
/// refused rather than silently truncated.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput(format!(
            "Password exceeds maximum length of {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    Ok(())
}
