//! In-memory credential store.
//!
//! Suitable for tests and single-process deployments that can afford to lose
//! their sessions on restart. Each trait method takes the lock for exactly
//! one read or one compare-and-set, which gives the per-row atomicity the
//! contract asks for.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Account, Credential, CredentialStore, RenewalToken};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, Credential>,
    renewal_tokens: HashMap<String, RenewalToken>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AuthResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AuthError::Database("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AuthResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AuthError::Database("Memory store lock poisoned".to_string()))
    }
}

fn email_taken(tables: &Tables, email: &str, except: Option<Uuid>) -> bool {
    tables
        .users
        .values()
        .any(|c| c.account.email == email && Some(c.account.id) != except)
}

impl CredentialStore for MemoryCredentialStore {
    fn find_credential_by_email(&self, email: &str) -> AuthResult<Option<Credential>> {
        let tables = self.read()?;
        Ok(tables
            .users
            .values()
            .find(|c| c.account.email == email)
            .cloned())
    }

    fn create_credential(&self, email: &str, password_hash: &str) -> AuthResult<Account> {
        let mut tables = self.write()?;
        if email_taken(&tables, email, None) {
            return Err(AuthError::InvalidInput(
                "Email is already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            account.id,
            Credential {
                account: account.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(account)
    }

    fn update_credential(
        &self,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<Account> {
        let mut tables = self.write()?;
        if email_taken(&tables, email, Some(user_id)) {
            return Err(AuthError::InvalidInput(
                "Email is already registered".to_string(),
            ));
        }

        let credential = tables
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::Unauthorized)?;
        credential.account.email = email.to_string();
        credential.account.updated_at = Utc::now();
        credential.password_hash = password_hash.to_string();
        Ok(credential.account.clone())
    }

    fn store_renewal_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let mut tables = self.write()?;
        if tables.renewal_tokens.contains_key(token) {
            return Err(AuthError::Database(
                "Renewal token already exists".to_string(),
            ));
        }

        tables.renewal_tokens.insert(
            token.to_string(),
            RenewalToken {
                token: token.to_string(),
                user_id,
                created_at: Utc::now(),
                expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    fn find_renewal_token(&self, token: &str) -> AuthResult<Option<RenewalToken>> {
        Ok(self.read()?.renewal_tokens.get(token).cloned())
    }

    fn revoke_renewal_token(&self, token: &str, at: DateTime<Utc>) -> AuthResult<bool> {
        let mut tables = self.write()?;
        match tables.renewal_tokens.get_mut(token) {
            Some(row) => {
                row.revoked_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn revoke_renewal_tokens_for(&self, user_id: Uuid, at: DateTime<Utc>) -> AuthResult<u64> {
        let mut tables = self.write()?;
        let mut revoked = 0;
        for row in tables.renewal_tokens.values_mut() {
            if row.user_id == user_id && row.revoked_at.is_none() {
                row.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
