//! Persistence contract and the records it deals in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthResult;

/// Public identity fields of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Subject identifier
    pub id: Uuid,

    pub email: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// An account together with its password hash.
#[derive(Debug, Clone)]
pub struct Credential {
    pub account: Account,

    /// bcrypt hash, salt and cost included
    pub password_hash: String,
}

/// Lifecycle state of a renewal token at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalState {
    /// Persisted, not revoked, not expired
    Active,

    /// Past its expiry; derived from time, never stored
    Expired,

    /// Explicitly revoked; terminal
    Revoked,
}

/// A persisted renewal token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalToken {
    /// Opaque token value (unique)
    pub token: String,

    /// Owning identity
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Set once on revocation, never cleared
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RenewalToken {
    /// State of the token at `now`. Revocation takes precedence over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> RenewalState {
        if self.revoked_at.is_some() {
            RenewalState::Revoked
        } else if now >= self.expires_at {
            RenewalState::Expired
        } else {
            RenewalState::Active
        }
    }

    /// Whether the token can mint access tokens at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == RenewalState::Active
    }
}

/// Trait for the persistence collaborator.
///
/// Every method is a single atomic operation from the caller's point of view.
/// In particular [`CredentialStore::revoke_renewal_token`] must set
/// `revoked_at` with one compare-and-set, never a read followed by a write.
///
/// # Example
///
/// ```rust,ignore
/// use chirpy_auth::session::CredentialStore;
///
/// struct PostgresStore { /* pool */ }
///
/// impl CredentialStore for PostgresStore {
///     fn find_credential_by_email(&self, email: &str) -> AuthResult<Option<Credential>> {
///         // SELECT ... FROM users WHERE email = $1
///     }
///     // ... implement other methods
/// }
/// ```
pub trait CredentialStore: Send + Sync {
    /// Look up an account and its password hash by email.
    fn find_credential_by_email(&self, email: &str) -> AuthResult<Option<Credential>>;

    /// Create an account. A taken email fails with `InvalidInput`.
    fn create_credential(&self, email: &str, password_hash: &str) -> AuthResult<Account>;

    /// Replace an account's email and password hash. An unknown identity
    /// fails with `Unauthorized`, a taken email with `InvalidInput`.
    fn update_credential(
        &self,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<Account>;

    /// Persist a new renewal token. Token values are unique.
    fn store_renewal_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// Read a renewal token row.
    fn find_renewal_token(&self, token: &str) -> AuthResult<Option<RenewalToken>>;

    /// Set `revoked_at = at` if it is still unset.
    ///
    /// Returns whether the row exists; revoking an already revoked token
    /// returns `true` and leaves the original timestamp alone.
    fn revoke_renewal_token(&self, token: &str, at: DateTime<Utc>) -> AuthResult<bool>;

    /// Revoke every unrevoked renewal token of a user. Returns how many changed.
    fn revoke_renewal_tokens_for(&self, user_id: Uuid, at: DateTime<Utc>) -> AuthResult<u64>;
}
