//! Configuration for the auth subsystem.

use chrono::Duration;

use crate::error::{AuthError, AuthResult};
use crate::password::DEFAULT_COST;
use crate::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_RENEWAL_TOKEN_TTL_DAYS, MAX_ACCESS_TOKEN_TTL_SECS,
    MAX_RENEWAL_TOKEN_TTL_DAYS, MIN_SECRET_LENGTH,
};

/// Lowest and highest work factors bcrypt accepts
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Auth subsystem settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens (`SECRET`)
    pub token_secret: String,

    /// Key webhook callers present as `ApiKey <key>` (`POLKA_KEY`)
    pub api_key: Option<String>,

    /// SQLite database path (`DB_URL`, default: `chirpy.db`)
    pub database_path: String,

    /// Access token lifetime (`ACCESS_TOKEN_TTL_SECS`, default: 1 hour)
    pub access_token_ttl: Duration,

    /// Renewal token lifetime (`RENEWAL_TOKEN_TTL_DAYS`, default: 60 days)
    pub renewal_token_ttl: Duration,

    /// bcrypt work factor (`BCRYPT_COST`)
    pub password_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("database_path", &self.database_path)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("renewal_token_ttl", &self.renewal_token_ttl)
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Create a configuration with defaults around the given token secret.
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            api_key: None,
            database_path: "chirpy.db".to_string(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            renewal_token_ttl: Duration::days(DEFAULT_RENEWAL_TOKEN_TTL_DAYS),
            password_cost: DEFAULT_COST,
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> AuthResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(AuthError::Config(format!("Failed to read .env: {}", e)));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Config("SECRET must be set".to_string()))?;

        let mut config = Self::new(secret);

        if let Some(key) = lookup("POLKA_KEY").filter(|k| !k.is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(path) = lookup("DB_URL").filter(|p| !p.is_empty()) {
            config.database_path = path;
        }
        if let Some(secs) = parse_var::<i64>(&lookup, "ACCESS_TOKEN_TTL_SECS")? {
            config.access_token_ttl = Duration::try_seconds(secs).ok_or_else(|| {
                AuthError::Config(format!("ACCESS_TOKEN_TTL_SECS is out of range: {}", secs))
            })?;
        }
        if let Some(days) = parse_var::<i64>(&lookup, "RENEWAL_TOKEN_TTL_DAYS")? {
            config.renewal_token_ttl = Duration::try_days(days).ok_or_else(|| {
                AuthError::Config(format!("RENEWAL_TOKEN_TTL_DAYS is out of range: {}", days))
            })?;
        }
        if let Some(cost) = parse_var::<u32>(&lookup, "BCRYPT_COST")? {
            config.password_cost = cost;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the webhook API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the SQLite database path.
    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the access token lifetime.
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Set the renewal token lifetime.
    pub fn with_renewal_token_ttl(mut self, ttl: Duration) -> Self {
        self.renewal_token_ttl = ttl;
        self
    }

    /// Set the bcrypt work factor.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> AuthResult<()> {
        if self.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::Config(format!(
                "SECRET must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.access_token_ttl <= Duration::zero()
            || self.access_token_ttl > Duration::seconds(MAX_ACCESS_TOKEN_TTL_SECS)
        {
            return Err(AuthError::Config(format!(
                "Access token TTL must be between 1 and {} seconds",
                MAX_ACCESS_TOKEN_TTL_SECS
            )));
        }
        if self.renewal_token_ttl <= Duration::zero()
            || self.renewal_token_ttl > Duration::days(MAX_RENEWAL_TOKEN_TTL_DAYS)
        {
            return Err(AuthError::Config(format!(
                "Renewal token TTL must be between 1 and {} days",
                MAX_RENEWAL_TOKEN_TTL_DAYS
            )));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.password_cost) {
            return Err(AuthError::Config(format!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> AuthResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AuthError::Config(format!("{} has an invalid value: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEST_SECRET: &str = "test-secret-key-32bytes-long!!!!";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_lookup(lookup(&[("SECRET", TEST_SECRET)])).unwrap();

        assert_eq!(config.access_token_ttl, Duration::hours(1));
        assert_eq!(config.renewal_token_ttl, Duration::days(60));
        assert_eq!(config.password_cost, DEFAULT_COST);
        assert_eq!(config.database_path, "chirpy.db");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("SECRET", TEST_SECRET),
            ("POLKA_KEY", "f271c81ff7084ee5b99a5091b42d486e"),
            ("DB_URL", "/tmp/chirpy-test.db"),
            ("ACCESS_TOKEN_TTL_SECS", "900"),
            ("RENEWAL_TOKEN_TTL_DAYS", "7"),
            ("BCRYPT_COST", "6"),
        ]))
        .unwrap();

        assert_eq!(
            config.api_key.as_deref(),
            Some("f271c81ff7084ee5b99a5091b42d486e")
        );
        assert_eq!(config.database_path, "/tmp/chirpy-test.db");
        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert_eq!(config.renewal_token_ttl, Duration::days(7));
        assert_eq!(config.password_cost, 6);
    }

    #[test]
    fn test_missing_or_short_secret() {
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[])),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[("SECRET", "short")])),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("ACCESS_TOKEN_TTL_SECS", "soon"),
            ("ACCESS_TOKEN_TTL_SECS", "0"),
            ("RENEWAL_TOKEN_TTL_DAYS", "-1"),
            ("ACCESS_TOKEN_TTL_SECS", "9223372036854775807"),
            ("ACCESS_TOKEN_TTL_SECS", "2592001"),
            ("RENEWAL_TOKEN_TTL_DAYS", "100000000"),
            ("RENEWAL_TOKEN_TTL_DAYS", "3651"),
            ("BCRYPT_COST", "3"),
            ("BCRYPT_COST", "32"),
        ] {
            let result = AuthConfig::from_lookup(lookup(&[("SECRET", TEST_SECRET), (key, value)]));
            assert!(
                matches!(result, Err(AuthError::Config(_))),
                "accepted {key}={value}"
            );
        }
    }

    #[test]
    fn test_oversized_builder_ttls_rejected() {
        let config =
            AuthConfig::new(TEST_SECRET).with_renewal_token_ttl(Duration::days(100_000_000));
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let config = AuthConfig::new(TEST_SECRET).with_access_token_ttl(Duration::days(31));
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let config = AuthConfig::new(TEST_SECRET)
            .with_access_token_ttl(Duration::days(30))
            .with_renewal_token_ttl(Duration::days(3650));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::new(TEST_SECRET).with_api_key("polka-key");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(TEST_SECRET));
        assert!(!rendered.contains("polka-key"));
    }
}
