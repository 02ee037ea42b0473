//! Opaque renewal token generation.
//!
//! A renewal token is 32 bytes from the operating system's CSPRNG, hex
//! encoded. It carries no structure; only a matching persisted row gives it
//! meaning.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{AuthError, AuthResult};

/// Number of random bytes in a renewal token (256 bits).
pub const RENEWAL_TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token.
pub const RENEWAL_TOKEN_LENGTH: usize = RENEWAL_TOKEN_BYTES * 2;

/// Generate a new renewal token.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if the entropy source is unavailable.
pub fn generate_renewal_token() -> AuthResult<String> {
    let mut bytes = [0u8; RENEWAL_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Internal(format!("Entropy source unavailable: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Whether `token` has the shape of a generated renewal token.
///
/// Lets callers turn away garbage before it reaches the store.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == RENEWAL_TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}
