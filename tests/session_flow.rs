#![cfg(feature = "session-sqlite")]

use chirpy_auth::prelude::*;
use chirpy_auth::request_counter;
use chrono::{Duration, Utc};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};

const SECRET: &str = "integration-secret-32-bytes-long";

fn manager_at(path: &std::path::Path) -> SessionManager<SqliteCredentialStore> {
    let config = AuthConfig::new(SECRET)
        .with_database_path(path.to_string_lossy())
        .with_password_cost(4);
    let store = SqliteCredentialStore::new(&config.database_path).unwrap();
    SessionManager::from_config(store, &config).unwrap()
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[test]
fn login_refresh_revoke_round() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = manager_at(&dir.path().join("chirpy.db"));

    let account = sessions.register("a@x.com", "secret1").unwrap();
    let login = sessions.login("a@x.com", "secret1").unwrap();

    let access_left = login.access_token_expires_at - Utc::now();
    assert!(access_left > Duration::minutes(59) && access_left <= Duration::hours(1));
    let renewal_left = login.renewal_token_expires_at - Utc::now();
    assert!(renewal_left > Duration::days(59) && renewal_left <= Duration::days(60));

    let refreshed = sessions
        .refresh_from_headers(&bearer(&login.renewal_token))
        .unwrap();
    let claims = sessions.codec().verify_claims(&refreshed.token).unwrap();
    assert_eq!(claims.subject().unwrap(), account.id);
    assert_eq!(claims.exp - claims.iat, 3600);

    sessions
        .revoke_from_headers(&bearer(&login.renewal_token))
        .unwrap();
    let err = sessions
        .refresh_from_headers(&bearer(&login.renewal_token))
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
    assert_eq!(err.http_status_code(), 401);

    // Second revoke is a no-op success
    sessions
        .revoke_from_headers(&bearer(&login.renewal_token))
        .unwrap();
}

#[test]
fn sessions_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chirpy.db");

    let renewal_token = {
        let sessions = manager_at(&path);
        sessions.register("a@x.com", "secret1").unwrap();
        sessions.login("a@x.com", "secret1").unwrap().renewal_token
    };

    let sessions = manager_at(&path);
    assert!(sessions.refresh(&renewal_token).is_ok());
    sessions.revoke(&renewal_token).unwrap();

    let reopened = manager_at(&path);
    assert!(reopened.refresh(&renewal_token).is_err());
}

#[test]
fn access_token_from_another_secret_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = manager_at(&dir.path().join("chirpy.db"));
    let account = sessions.register("a@x.com", "secret1").unwrap();

    let other = AccessTokenCodec::new(b"some-other-secret-32-bytes-long!").unwrap();
    for ttl in [Duration::hours(1), Duration::hours(-1)] {
        let token = other.issue(account.id, ttl).unwrap().token;
        assert!(matches!(
            sessions.authenticate(&bearer(&token)),
            Err(AuthError::Unauthorized)
        ));
    }
}

#[test]
fn ownership_and_webhook_checks() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = manager_at(&dir.path().join("chirpy.db"));
    let alice = sessions.register("alice@x.com", "secret1").unwrap();
    let bob = sessions.register("bob@x.com", "secret2").unwrap();

    let login = sessions.login("bob@x.com", "secret2").unwrap();
    let subject = sessions.authenticate(&bearer(&login.access_token)).unwrap();
    assert!(ensure_owner(subject, bob.id).is_ok());
    assert!(matches!(
        ensure_owner(subject, alice.id),
        Err(AuthError::Forbidden)
    ));

    let mut webhook = HeaderMap::new();
    webhook.insert(AUTHORIZATION, HeaderValue::from_static("ApiKey polka-key"));
    assert!(authorize_api_key(&webhook, "polka-key").is_ok());
    assert!(authorize_api_key(&bearer("polka-key"), "polka-key").is_err());
}

#[test]
fn request_counter_counts_across_threads() {
    let counter = request_counter();
    let before = counter.get();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..250 {
                    counter.increment();
                }
            });
        }
    });

    assert!(counter.get() >= before + 1000);
}
