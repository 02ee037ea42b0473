//! Renewal-token sessions.
//!
//! This module defines the persistence contract the session manager relies on
//! ([`CredentialStore`]), two implementations of it (in-memory and SQLite),
//! and the [`SessionManager`] that runs the login, refresh and revoke flows.

mod manager;
mod memory;
mod store;

#[cfg(feature = "session-sqlite")]
mod sqlite;

pub use manager::{ensure_owner, LoginSession, SessionManager};
pub use memory::MemoryCredentialStore;
pub use store::{Account, Credential, CredentialStore, RenewalState, RenewalToken};

#[cfg(feature = "session-sqlite")]
pub use sqlite::SqliteCredentialStore;
