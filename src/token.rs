//! Access token issuance and verification.
//!
//! Access tokens are compact HS256 JWTs (`header.claims.signature`) signed
//! with HMAC-SHA256. They are never persisted: validity is decided by the
//! signature and the embedded expiry alone, and the signature check uses a
//! constant-time comparison.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::{ISSUER, MAX_TOKEN_LENGTH, MIN_SECRET_LENGTH};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// JOSE header of an access token.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Registered claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer, always [`ISSUER`] for tokens minted here
    pub iss: String,

    /// Subject identity as a hyphenated UUID
    pub sub: String,

    /// Issued-at timestamp (Unix seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix seconds)
    pub exp: i64,
}

impl AccessClaims {
    /// Build claims for `subject` valid for `ttl` starting now.
    ///
    /// Fails with [`AuthError::Internal`] if `now + ttl` is not a
    /// representable date.
    pub fn new(subject: Uuid, ttl: Duration) -> AuthResult<Self> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::Internal(format!("Token lifetime out of range: {}", ttl))
        })?;
        Ok(Self {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Get the remaining validity time in seconds
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Parse the subject into an identity.
    pub fn subject(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Subject is not a valid identity".to_string()))
    }
}

/// A freshly minted access token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access tokens with a shared HMAC secret.
///
/// # Example
///
/// ```rust
/// use chirpy_auth::AccessTokenCodec;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// let codec = AccessTokenCodec::new(b"a]j2k#9xLmN!pQ4rS7tU0vW3yZ6bC8dE").unwrap();
/// let user = Uuid::new_v4();
///
/// let issued = codec.issue(user, Duration::hours(1)).unwrap();
/// assert_eq!(codec.verify(&issued.token).unwrap(), user);
/// ```
#[derive(Clone)]
pub struct AccessTokenCodec {
    secret: Vec<u8>,
    /// Seconds a token is still accepted past its expiry (default: 0)
    pub leeway_seconds: i64,
}

impl std::fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCodec")
            .field("secret", &"<redacted>")
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl AccessTokenCodec {
    /// Create a codec with the given HMAC secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the secret is shorter than 32 bytes.
    pub fn new(secret: &[u8]) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::Config(format!(
                "Token secret must be at least {} bytes ({} bits). Got {} bytes.",
                MIN_SECRET_LENGTH,
                MIN_SECRET_LENGTH * 8,
                secret.len()
            )));
        }
        Ok(Self {
            secret: secret.to_vec(),
            leeway_seconds: 0,
        })
    }

    /// Set the expiry leeway in seconds.
    pub fn with_leeway(mut self, seconds: i64) -> Self {
        self.leeway_seconds = seconds.max(0);
        self
    }

    /// Issue a token for `subject` expiring `ttl` from now.
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> AuthResult<IssuedAccessToken> {
        let claims = AccessClaims::new(subject, ttl)?;
        let token = self.sign(&claims)?;
        Ok(IssuedAccessToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Sign arbitrary claims. Issuance goes through [`AccessTokenCodec::issue`];
    /// this exists for callers that need control over the timestamps.
    pub fn sign(&self, claims: &AccessClaims) -> AuthResult<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_json = serde_json::to_vec(&header)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize header: {}", e)))?;
        let claims_json = serde_json::to_vec(claims)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize claims: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.compute_signature(&signing_input)?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str) -> AuthResult<Uuid> {
        self.verify_claims(token)?.subject()
    }

    /// Verify a token and return all of its claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] for empty or oversized input, bad
    ///   structure, bad encoding, a foreign algorithm or issuer, or a bad
    ///   signature
    /// - [`AuthError::TokenExpired`] once `exp` (plus leeway) has passed
    pub fn verify_claims(&self, token: &str) -> AuthResult<AccessClaims> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken("Token is empty".to_string()));
        }

        // Length check to prevent DoS
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(AuthError::InvalidToken(format!(
                "Token exceeds maximum length of {} bytes",
                MAX_TOKEN_LENGTH
            )));
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidToken(
                "Token must have format: header.claims.signature".to_string(),
            ));
        }

        let header: Header = decode_segment(parts[0], "header")?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidToken(format!(
                "Unsupported algorithm: {}",
                header.alg
            )));
        }

        let signing_input_len = parts[0].len() + 1 + parts[1].len();
        self.verify_signature(&token[..signing_input_len], parts[2])?;

        let claims: AccessClaims = decode_segment(parts[1], "claims")?;
        if claims.iss != ISSUER {
            return Err(AuthError::InvalidToken(format!(
                "Unexpected issuer: {}",
                claims.iss
            )));
        }

        let now = Utc::now().timestamp();
        if now >= claims.exp.saturating_add(self.leeway_seconds) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn compute_signature(&self, signing_input: &str) -> AuthResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(signing_input.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify_signature(&self, signing_input: &str, signature_b64: &str) -> AuthResult<()> {
        let provided_sig = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken("Invalid signature encoding".to_string()))?;

        let expected_sig = self.compute_signature(signing_input)?;

        if provided_sig.ct_eq(&expected_sig).into() {
            Ok(())
        } else {
            Err(AuthError::InvalidToken("Invalid signature".to_string()))
        }
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken(format!("Invalid {} encoding", what)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("Invalid {}: {}", what, e)))
}

/// Issue an access token for `subject` signed with `secret`.
pub fn issue_access_token(subject: Uuid, secret: &[u8], ttl: Duration) -> AuthResult<String> {
    Ok(AccessTokenCodec::new(secret)?.issue(subject, ttl)?.token)
}

/// Verify an access token signed with `secret` and return its subject.
pub fn verify_access_token(token: &str, secret: &[u8]) -> AuthResult<Uuid> {
    AccessTokenCodec::new(secret)?.verify(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test secrets that meet the 32-byte minimum requirement
    const TEST_SECRET: &[u8; 32] = b"test-secret-key-32bytes-long!!!!";
    const TEST_SECRET_2: &[u8; 32] = b"another-secret-32-bytes-long!!!!";

    fn claims_at(subject: Uuid, iat: i64, exp: i64) -> AccessClaims {
        AccessClaims {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat,
            exp,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let user = Uuid::new_v4();

        let issued = codec.issue(user, Duration::hours(1)).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert_eq!(codec.verify(&issued.token).unwrap(), user);

        let claims = codec.verify_claims(&issued.token).unwrap();
        assert_eq!(claims.iss, "chirpy");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_free_functions() {
        let user = Uuid::new_v4();
        let token = issue_access_token(user, TEST_SECRET, Duration::hours(1)).unwrap();
        assert_eq!(verify_access_token(&token, TEST_SECRET).unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let other = AccessTokenCodec::new(TEST_SECRET_2).unwrap();

        let token = codec.issue(Uuid::new_v4(), Duration::hours(1)).unwrap().token;
        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected_even_when_expired() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let other = AccessTokenCodec::new(TEST_SECRET_2).unwrap();
        let now = Utc::now().timestamp();

        let token = codec
            .sign(&claims_at(Uuid::new_v4(), now - 7200, now - 3600))
            .unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let token = codec
            .issue(Uuid::new_v4(), Duration::hours(-1))
            .unwrap()
            .token;

        assert!(matches!(codec.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_leeway() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap().with_leeway(60);
        let now = Utc::now().timestamp();
        let user = Uuid::new_v4();

        let token = codec.sign(&claims_at(user, now - 3600, now - 30)).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_out_of_range_ttl() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();

        for ttl in [
            Duration::milliseconds(i64::MAX),
            Duration::milliseconds(-i64::MAX),
            Duration::days(365 * 1_000_000),
        ] {
            assert!(matches!(
                codec.issue(Uuid::new_v4(), ttl),
                Err(AuthError::Internal(_))
            ));
        }
    }

    #[test]
    fn test_leeway_with_far_future_expiry() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap().with_leeway(60);
        let user = Uuid::new_v4();

        let token = codec
            .sign(&claims_at(user, Utc::now().timestamp(), i64::MAX))
            .unwrap();
        assert_eq!(codec.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_secret_too_short() {
        assert!(AccessTokenCodec::new(b"test-secret").is_err());
        assert!(AccessTokenCodec::new(b"").is_err());
        assert!(AccessTokenCodec::new(b"exactly-32-bytes-secret-here!!!!").is_ok());
    }

    #[test]
    fn test_invalid_format() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();

        for token in ["", "invalidtoken", "a.b", "invalid.token.here", "!!!.???.***"] {
            assert!(
                matches!(codec.verify(token), Err(AuthError::InvalidToken(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_token_too_long() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let long_token = "a".repeat(MAX_TOKEN_LENGTH + 1);

        assert!(matches!(
            codec.verify(&long_token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let token = codec.issue(Uuid::new_v4(), Duration::hours(1)).unwrap().token;
        let parts: Vec<&str> = token.split('.').collect();

        let forged = codec
            .sign(&AccessClaims::new(Uuid::new_v4(), Duration::hours(1)).unwrap())
            .unwrap();
        let forged_claims = forged.split('.').nth(1).unwrap();

        let spliced = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(matches!(
            codec.verify(&spliced),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_foreign_algorithm_rejected() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let token = codec.issue(Uuid::new_v4(), Duration::hours(1)).unwrap().token;
        let rest = token.splitn(2, '.').nth(1).unwrap();

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let downgraded = format!("{}.{}", none_header, rest);
        assert!(matches!(
            codec.verify(&downgraded),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let now = Utc::now().timestamp();
        let mut claims = claims_at(Uuid::new_v4(), now, now + 3600);
        claims.iss = "someone-else".to_string();

        let token = codec.sign(&claims).unwrap();
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_malformed_subject_rejected() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let now = Utc::now().timestamp();
        let mut claims = claims_at(Uuid::new_v4(), now, now + 3600);
        claims.sub = "not-a-uuid".to_string();

        let token = codec.sign(&claims).unwrap();
        assert!(codec.verify_claims(&token).is_ok());
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let codec = AccessTokenCodec::new(TEST_SECRET).unwrap();
        let rendered = format!("{:?}", codec);
        assert!(!rendered.contains("test-secret"));
    }
}
