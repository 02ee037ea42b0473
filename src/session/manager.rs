//! Login, refresh and revoke flows over a [`CredentialStore`].
//!
//! Access tokens are stateless and checked by signature alone. Renewal tokens
//! are persisted and go through a small state machine:
//!
//! ```text
//! Active --(time passes)--> Expired
//! Active --(revoke)-------> Revoked   (terminal)
//! ```
//!
//! Refresh does not rotate the renewal token: the same value keeps minting
//! access tokens until it is revoked or expires.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, CredentialStore, RenewalState};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::extract::extract_bearer;
use crate::password::{hash_password_with_cost, verify_password, DEFAULT_COST};
use crate::renewal::{self, generate_renewal_token};
use crate::token::{AccessTokenCodec, IssuedAccessToken};
use crate::validation::{validate_email, validate_password};
use crate::{DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_RENEWAL_TOKEN_TTL_DAYS};

/// Plaintext hashed once per manager to burn the same bcrypt time on logins
/// for unknown emails as on logins with a wrong password.
const DUMMY_PASSWORD: &str = "chirpy-auth-dummy-password";

/// Everything a successful login hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    pub account: Account,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub renewal_token: String,
    pub renewal_token_expires_at: DateTime<Utc>,
}

/// Session manager wrapping a [`CredentialStore`].
pub struct SessionManager<S: CredentialStore> {
    store: S,
    codec: AccessTokenCodec,
    /// Access token lifetime, also the cap for caller-requested lifetimes (default: 1 hour)
    pub access_ttl: Duration,
    /// Renewal token lifetime (default: 60 days)
    pub renewal_ttl: Duration,
    password_cost: u32,
    dummy_hash: OnceLock<Option<String>>,
}

impl<S: CredentialStore> SessionManager<S> {
    /// Create a session manager with the given store and token codec.
    pub fn new(store: S, codec: AccessTokenCodec) -> Self {
        Self {
            store,
            codec,
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            renewal_ttl: Duration::days(DEFAULT_RENEWAL_TOKEN_TTL_DAYS),
            password_cost: DEFAULT_COST,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Create a session manager from configuration.
    pub fn from_config(store: S, config: &AuthConfig) -> AuthResult<Self> {
        config.validate()?;
        let codec = AccessTokenCodec::new(config.token_secret.as_bytes())?;
        Ok(Self::new(store, codec)
            .with_access_ttl(config.access_token_ttl)
            .with_renewal_ttl(config.renewal_token_ttl)
            .with_password_cost(config.password_cost))
    }

    /// Set the access token lifetime.
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set the renewal token lifetime.
    pub fn with_renewal_ttl(mut self, ttl: Duration) -> Self {
        self.renewal_ttl = ttl;
        self
    }

    /// Set the bcrypt work factor.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self.dummy_hash = OnceLock::new();
        self
    }

    /// bcrypt work factor for new hashes.
    pub fn password_cost(&self) -> u32 {
        self.password_cost
    }

    /// Get underlying store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the token codec.
    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    /// Create an account.
    pub fn register(&self, email: &str, password: &str) -> AuthResult<Account> {
        validate_email(email)?;
        validate_password(password)?;

        let hash = hash_password_with_cost(password, self.password_cost)
            .map_err(|e| logged("register", e))?;
        let account = self
            .store
            .create_credential(email, &hash)
            .map_err(|e| logged("register", e))?;

        tracing::info!(user_id = %account.id, "Account created");
        Ok(account)
    }

    /// Log in with the configured access token lifetime.
    pub fn login(&self, email: &str, password: &str) -> AuthResult<LoginSession> {
        self.login_with_ttl(email, password, None)
    }

    /// Log in, optionally asking for a shorter access token lifetime.
    ///
    /// A requested lifetime is honoured only when it is positive and no longer
    /// than [`SessionManager::access_ttl`].
    ///
    /// Unknown email and wrong password both fail with
    /// [`AuthError::AuthenticationFailed`] after the same amount of bcrypt work.
    pub fn login_with_ttl(
        &self,
        email: &str,
        password: &str,
        requested_ttl: Option<Duration>,
    ) -> AuthResult<LoginSession> {
        let credential = self
            .store
            .find_credential_by_email(email)
            .map_err(|e| logged("login", e))?;

        let Some(credential) = credential else {
            self.burn_dummy_verification(password);
            tracing::warn!("Login failed");
            return Err(AuthError::AuthenticationFailed);
        };

        match verify_password(password, &credential.password_hash) {
            Ok(()) => {}
            Err(AuthError::AuthenticationFailed) => {
                tracing::warn!(user_id = %credential.account.id, "Login failed");
                return Err(AuthError::AuthenticationFailed);
            }
            Err(e) => return Err(logged("login", e)),
        }

        let user_id = credential.account.id;
        let access = self
            .codec
            .issue(user_id, self.effective_ttl(requested_ttl))
            .map_err(|e| logged("login", e))?;

        let renewal_token = generate_renewal_token().map_err(|e| logged("login", e))?;
        let renewal_expires_at = Utc::now()
            .checked_add_signed(self.renewal_ttl)
            .ok_or_else(|| AuthError::Config("Renewal token lifetime out of range".to_string()))
            .map_err(|e| logged("login", e))?;
        self.store
            .store_renewal_token(&renewal_token, user_id, renewal_expires_at)
            .map_err(|e| logged("login", e))?;

        tracing::info!(user_id = %user_id, "Login succeeded");
        Ok(LoginSession {
            account: credential.account,
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            renewal_token,
            renewal_token_expires_at: renewal_expires_at,
        })
    }

    /// Mint a new access token from a renewal token.
    ///
    /// Unknown, revoked and expired renewal tokens all fail with
    /// [`AuthError::Unauthorized`]. The renewal token itself is not rotated.
    pub fn refresh(&self, renewal_token: &str) -> AuthResult<IssuedAccessToken> {
        if !renewal::is_well_formed(renewal_token) {
            tracing::debug!("Refresh rejected: malformed renewal token");
            return Err(AuthError::Unauthorized);
        }

        let row = self
            .store
            .find_renewal_token(renewal_token)
            .map_err(|e| logged("refresh", e))?
            .ok_or_else(|| {
                tracing::debug!("Refresh rejected: unknown renewal token");
                AuthError::Unauthorized
            })?;

        let state = row.state_at(Utc::now());
        if state != RenewalState::Active {
            tracing::debug!(user_id = %row.user_id, ?state, "Refresh rejected");
            return Err(AuthError::Unauthorized);
        }

        self.codec
            .issue(row.user_id, self.access_ttl)
            .map_err(|e| logged("refresh", e))
    }

    /// Permanently revoke a renewal token.
    ///
    /// Revoking an already revoked token succeeds and keeps the original
    /// revocation time. An unknown token fails with [`AuthError::Unauthorized`].
    pub fn revoke(&self, renewal_token: &str) -> AuthResult<()> {
        if !renewal::is_well_formed(renewal_token) {
            tracing::debug!("Revoke rejected: malformed renewal token");
            return Err(AuthError::Unauthorized);
        }

        let found = self
            .store
            .revoke_renewal_token(renewal_token, Utc::now())
            .map_err(|e| logged("revoke", e))?;

        if !found {
            tracing::debug!("Revoke rejected: unknown renewal token");
            return Err(AuthError::Unauthorized);
        }

        tracing::info!("Renewal token revoked");
        Ok(())
    }

    /// Verify an access token and return its subject.
    ///
    /// Every verification failure is folded into [`AuthError::Unauthorized`].
    pub fn verify_access(&self, access_token: &str) -> AuthResult<Uuid> {
        match self.codec.verify(access_token) {
            Ok(subject) => Ok(subject),
            Err(e) if e.is_unauthorized() => {
                tracing::debug!(reason = %e, "Access token rejected");
                Err(AuthError::Unauthorized)
            }
            Err(e) => Err(logged("verify_access", e)),
        }
    }

    /// Authenticate a protected-resource request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Uuid> {
        let token = extract_bearer(headers).map_err(|_| AuthError::Unauthorized)?;
        self.verify_access(&token)
    }

    /// [`SessionManager::refresh`] with the renewal token taken from
    /// `Authorization: Bearer <token>`.
    pub fn refresh_from_headers(&self, headers: &HeaderMap) -> AuthResult<IssuedAccessToken> {
        let token = extract_bearer(headers).map_err(|_| AuthError::Unauthorized)?;
        self.refresh(&token)
    }

    /// [`SessionManager::revoke`] with the renewal token taken from
    /// `Authorization: Bearer <token>`.
    pub fn revoke_from_headers(&self, headers: &HeaderMap) -> AuthResult<()> {
        let token = extract_bearer(headers).map_err(|_| AuthError::Unauthorized)?;
        self.revoke(&token)
    }

    /// Replace the email and password of `user_id`.
    ///
    /// The new hash gets a fresh salt, and every renewal token the user holds
    /// is revoked. Access tokens already issued stay valid until they expire.
    pub fn change_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
    ) -> AuthResult<Account> {
        validate_email(email)?;
        validate_password(password)?;

        let hash = hash_password_with_cost(password, self.password_cost)
            .map_err(|e| logged("change_credentials", e))?;
        let account = self
            .store
            .update_credential(user_id, email, &hash)
            .map_err(|e| logged("change_credentials", e))?;

        let revoked = self
            .store
            .revoke_renewal_tokens_for(user_id, Utc::now())
            .map_err(|e| logged("change_credentials", e))?;

        tracing::info!(user_id = %user_id, revoked, "Credentials changed");
        Ok(account)
    }

    fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if ttl > Duration::zero() && ttl <= self.access_ttl => ttl,
            _ => self.access_ttl,
        }
    }

    fn burn_dummy_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| hash_password_with_cost(DUMMY_PASSWORD, self.password_cost).ok());
        if let Some(hash) = dummy {
            let _ = verify_password(password, hash);
        }
    }
}

/// Fail with [`AuthError::Forbidden`] unless `subject` owns the resource.
pub fn ensure_owner(subject: Uuid, owner: Uuid) -> AuthResult<()> {
    if subject == owner {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Log server-side failures once, where they are first seen by the manager.
fn logged(operation: &'static str, err: AuthError) -> AuthError {
    if err.is_internal() {
        tracing::error!(operation, error = %err, "Auth operation failed");
    }
    err
}
