//! Credential extraction from the `Authorization` header.
//!
//! Two schemes are understood: `Bearer <token>` for access and renewal
//! tokens, and `ApiKey <key>` for trusted webhook callers. When the header
//! carries several values they are scanned in the order the transport
//! delivered them and the first value with the requested scheme wins.
//!
//! Extraction is strict: a header that is present but holds no value with the
//! requested scheme, or holds the scheme word with nothing after it, fails
//! with [`AuthError::MissingCredential`] instead of yielding an empty token.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::error::{AuthError, AuthResult};

/// Scheme word for access and renewal tokens
pub const BEARER_SCHEME: &str = "Bearer";

/// Scheme word for webhook API keys
pub const API_KEY_SCHEME: &str = "ApiKey";

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> AuthResult<String> {
    extract_scheme(headers, BEARER_SCHEME)
}

/// Extract the key from `Authorization: ApiKey <key>`.
pub fn extract_api_key(headers: &HeaderMap) -> AuthResult<String> {
    extract_scheme(headers, API_KEY_SCHEME)
}

/// Check the request's API key against the configured one.
///
/// The comparison is constant-time. An empty configured key never matches.
pub fn authorize_api_key(headers: &HeaderMap, expected: &str) -> AuthResult<()> {
    let provided = extract_api_key(headers)?;

    if expected.is_empty() {
        tracing::warn!("API key check attempted with no key configured");
        return Err(AuthError::Unauthorized);
    }

    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        tracing::warn!("API key mismatch");
        Err(AuthError::Unauthorized)
    }
}

fn extract_scheme(headers: &HeaderMap, scheme: &str) -> AuthResult<String> {
    let mut values = headers.get_all(AUTHORIZATION).iter().peekable();
    if values.peek().is_none() {
        return Err(AuthError::MissingCredential(
            "Authorization header not found".to_string(),
        ));
    }

    for value in values {
        // Non-visible-ASCII values cannot carry either scheme
        let Ok(value) = value.to_str() else {
            continue;
        };
        let Some((word, rest)) = value.split_once(' ') else {
            continue;
        };
        if word != scheme {
            continue;
        }

        let credential = rest.trim();
        if credential.is_empty() {
            return Err(AuthError::MissingCredential(format!(
                "{} credential is empty",
                scheme
            )));
        }
        return Ok(credential.to_string());
    }

    Err(AuthError::MissingCredential(format!(
        "No {} credential in Authorization header",
        scheme
    )))
}
