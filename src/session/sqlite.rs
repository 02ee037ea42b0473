//! SQLite credential store implementation.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, OptionalExtension};
use uuid::Uuid;

use super::{Account, Credential, CredentialStore, RenewalToken};
use crate::error::{AuthError, AuthResult};

/// Applied to every pooled connection. Concurrent writers wait instead of
/// failing with `SQLITE_BUSY`.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// SQLite-backed credential store.
///
/// # Example
///
/// ```rust,ignore
/// use chirpy_auth::session::SqliteCredentialStore;
///
/// // In-memory database
/// let store = SqliteCredentialStore::in_memory()?;
///
/// // File-based database
/// let store = SqliteCredentialStore::new("chirpy.db")?;
/// ```
pub struct SqliteCredentialStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCredentialStore {
    /// Create a new SQLite credential store with the given database path.
    pub fn new(path: &str) -> AuthResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::new(manager)?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite credential store.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// capped at a single connection.
    pub fn in_memory() -> AuthResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(1).build(manager)?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create from an existing r2d2 pool.
    pub fn from_pool(pool: Pool<SqliteConnectionManager>) -> AuthResult<Self> {
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> AuthResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                hashed_password TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id);
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> AuthResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AuthError::Database(e.to_string()))
    }
}

fn to_timestamp(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn to_uuid(idx: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: to_uuid(0, row.get(0)?)?,
        email: row.get(1)?,
        created_at: to_timestamp(2, row.get(2)?)?,
        updated_at: to_timestamp(3, row.get(3)?)?,
    })
}

impl CredentialStore for SqliteCredentialStore {
    fn find_credential_by_email(&self, email: &str) -> AuthResult<Option<Credential>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, email, created_at, updated_at, hashed_password FROM users WHERE email = ?1",
        )?;

        let credential = stmt
            .query_row(params![email], |row| {
                Ok(Credential {
                    account: account_from_row(row)?,
                    password_hash: row.get(4)?,
                })
            })
            .optional()?;

        Ok(credential)
    }

    fn create_credential(&self, email: &str, password_hash: &str) -> AuthResult<Account> {
        let conn = self.conn()?;
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: to_timestamp(3, now.timestamp())?,
            updated_at: to_timestamp(4, now.timestamp())?,
        };

        let result = conn.execute(
            r#"
            INSERT INTO users (id, email, hashed_password, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![
                account.id.to_string(),
                account.email,
                password_hash,
                now.timestamp(),
            ],
        );

        match result {
            Ok(_) => Ok(account),
            Err(e) if is_unique_violation(&e) => Err(AuthError::InvalidInput(
                "Email is already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn update_credential(
        &self,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<Account> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            UPDATE users SET email = ?2, hashed_password = ?3, updated_at = ?4
            WHERE id = ?1
            RETURNING id, email, created_at, updated_at
            "#,
        )?;

        let result = stmt
            .query_row(
                params![
                    user_id.to_string(),
                    email,
                    password_hash,
                    Utc::now().timestamp()
                ],
                account_from_row,
            )
            .optional();

        match result {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(AuthError::Unauthorized),
            Err(e) if is_unique_violation(&e) => Err(AuthError::InvalidInput(
                "Email is already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn store_renewal_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        conn.execute(
            r#"
            INSERT INTO refresh_tokens (token, user_id, created_at, updated_at, expires_at, revoked_at)
            VALUES (?1, ?2, ?3, ?3, ?4, NULL)
            "#,
            params![token, user_id.to_string(), now, expires_at.timestamp()],
        )?;
        Ok(())
    }

    fn find_renewal_token(&self, token: &str) -> AuthResult<Option<RenewalToken>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT token, user_id, created_at, expires_at, revoked_at FROM refresh_tokens WHERE token = ?1",
        )?;

        let row = stmt
            .query_row(params![token], |row| {
                let revoked_at: Option<i64> = row.get(4)?;
                Ok(RenewalToken {
                    token: row.get(0)?,
                    user_id: to_uuid(1, row.get(1)?)?,
                    created_at: to_timestamp(2, row.get(2)?)?,
                    expires_at: to_timestamp(3, row.get(3)?)?,
                    revoked_at: revoked_at.map(|secs| to_timestamp(4, secs)).transpose()?,
                })
            })
            .optional()?;

        Ok(row)
    }

    fn revoke_renewal_token(&self, token: &str, at: DateTime<Utc>) -> AuthResult<bool> {
        let conn = self.conn()?;
        // Matches revoked rows too, so the row count reports existence while
        // COALESCE keeps the first revocation time.
        let rows = conn.execute(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = COALESCE(revoked_at, ?2),
                updated_at = CASE WHEN revoked_at IS NULL THEN ?2 ELSE updated_at END
            WHERE token = ?1
            "#,
            params![token, at.timestamp()],
        )?;
        Ok(rows > 0)
    }

    fn revoke_renewal_tokens_for(&self, user_id: Uuid, at: DateTime<Utc>) -> AuthResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute(
            r#"
            UPDATE refresh_tokens SET revoked_at = ?2, updated_at = ?2
            WHERE user_id = ?1 AND revoked_at IS NULL
            "#,
            params![user_id.to_string(), at.timestamp()],
        )?;
        Ok(rows as u64)
    }
}
