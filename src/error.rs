//! Error types for the chirpy-auth library.

use thiserror::Error;

/// Result type alias for chirpy-auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and session errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request input is malformed (bad email, oversized password, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Email/password pair did not match. Deliberately carries no detail.
    #[error("Incorrect email or password")]
    AuthenticationFailed,

    /// No usable credential in the Authorization header
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Access token is malformed, badly signed or carries a bad subject
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Access token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is unknown, revoked or expired (folded, state is not revealed)
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid identity without ownership of the resource
    #[error("Forbidden")]
    Forbidden,

    /// Configuration value is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence collaborator failure
    #[error("Database error: {0}")]
    Database(String),

    /// Cryptographic or entropy-source failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns true for every error that maps to a 401 at the boundary.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredential(_)
                | AuthError::InvalidToken(_)
                | AuthError::TokenExpired
                | AuthError::Unauthorized
        )
    }

    /// Returns true if this error is a server-side failure
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Config(_) | AuthError::Database(_) | AuthError::Internal(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            AuthError::InvalidInput(_) => 400,
            AuthError::AuthenticationFailed => 401,
            AuthError::MissingCredential(_) => 401,
            AuthError::InvalidToken(_) => 401,
            AuthError::TokenExpired => 401,
            AuthError::Unauthorized => 401,
            AuthError::Forbidden => 403,
            AuthError::Config(_) => 500,
            AuthError::Database(_) => 500,
            AuthError::Internal(_) => 500,
        }
    }

    /// Message safe to put in a response body.
    ///
    /// Token failures all read the same, as do both halves of a failed login,
    /// and server-side failures never expose their detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "Invalid request",
            AuthError::AuthenticationFailed => "Incorrect email or password",
            AuthError::MissingCredential(_)
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::Unauthorized => "Unauthorized",
            AuthError::Forbidden => "Forbidden",
            AuthError::Config(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                "Something went wrong"
            }
        }
    }
}

#[cfg(feature = "session-sqlite")]
impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Database(err.to_string())
    }
}

#[cfg(feature = "session-sqlite")]
impl From<r2d2::Error> for AuthError {
    fn from(err: r2d2::Error) -> Self {
        AuthError::Database(err.to_string())
    }
}
