//! # chirpy-auth - Authentication and session tokens for the Chirpy API
//!
//! Establishes who is calling and manages the lifecycle of the credentials
//! that prove it.
//!
//! ## Features
//!
//! - **Password Hashing**: salted bcrypt hashes with a configurable work factor
//! - **Access Tokens**: stateless HS256 JWTs, verified with constant-time comparison
//! - **Renewal Tokens**: 256-bit opaque tokens, persisted and revocable
//! - **Header Extraction**: `Authorization: Bearer` and `Authorization: ApiKey`
//! - **Session Management**: login, refresh and revoke over a pluggable store,
//!   with an in-memory and a SQLite backend
//!
//! ## Quick Start
//!
//! ```rust
//! use chirpy_auth::session::{MemoryCredentialStore, SessionManager};
//! use chirpy_auth::AccessTokenCodec;
//!
//! let codec = AccessTokenCodec::new(b"a]j2k#9xLmN!pQ4rS7tU0vW3yZ6bC8dE").unwrap();
//! let sessions = SessionManager::new(MemoryCredentialStore::new(), codec)
//!     .with_password_cost(4);
//!
//! let account = sessions.register("a@x.com", "secret1").unwrap();
//! let login = sessions.login("a@x.com", "secret1").unwrap();
//!
//! // Protected calls carry the access token
//! assert_eq!(sessions.verify_access(&login.access_token).unwrap(), account.id);
//!
//! // The renewal token mints new access tokens until it is revoked
//! let fresh = sessions.refresh(&login.renewal_token).unwrap();
//! sessions.revoke(&login.renewal_token).unwrap();
//! assert!(sessions.refresh(&login.renewal_token).is_err());
//! # let _ = fresh;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod password;
pub mod renewal;
pub mod session;
pub mod token;
pub mod validation;

// Re-exports for convenience
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use extract::{authorize_api_key, extract_api_key, extract_bearer};
pub use metrics::{request_counter, RequestCounter};
pub use password::{hash_password, verify_password};
pub use renewal::generate_renewal_token;
pub use session::{ensure_owner, Account, CredentialStore, LoginSession, SessionManager};
pub use token::{
    issue_access_token, verify_access_token, AccessClaims, AccessTokenCodec, IssuedAccessToken,
};
pub use validation::{validate_email, validate_password};

#[cfg(feature = "session-sqlite")]
pub use session::SqliteCredentialStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Issuer claim stamped on every access token
pub const ISSUER: &str = "chirpy";

/// Maximum token length (prevents DoS via large tokens)
pub const MAX_TOKEN_LENGTH: usize = 2048;

/// Minimum secret key length (32 bytes = 256 bits for HMAC-SHA256 security)
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default access token lifetime
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Default renewal token lifetime
pub const DEFAULT_RENEWAL_TOKEN_TTL_DAYS: i64 = 60;

/// Upper bound on a configured access token lifetime (30 days)
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;

/// Upper bound on a configured renewal token lifetime (10 years)
pub const MAX_RENEWAL_TOKEN_TTL_DAYS: i64 = 3650;

/// Maximum email length
pub const MAX_EMAIL_LENGTH: usize = 254;

/// bcrypt ignores input past 72 bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::AuthConfig;
    pub use crate::error::{AuthError, AuthResult};
    pub use crate::extract::{authorize_api_key, extract_api_key, extract_bearer};
    pub use crate::session::{
        ensure_owner, Account, CredentialStore, LoginSession, MemoryCredentialStore,
        SessionManager,
    };
    pub use crate::token::{AccessTokenCodec, IssuedAccessToken};

    #[cfg(feature = "session-sqlite")]
    pub use crate::session::SqliteCredentialStore;
}
