//! Admin session issue, expiry, and tampering.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use secrecy::SecretString;

use stockbot_integration_tests::{ADMIN_PASSWORD, ADMIN_USERNAME, SESSION_SECRET};
use stockbot_server::security::session::token_from_cookie_header;
use stockbot_server::security::{AdminCredentials, AuthError, SESSION_COOKIE_NAME, SessionManager};

fn manager(secret: &str) -> SessionManager {
    SessionManager::new(
        AdminCredentials {
            username: ADMIN_USERNAME.to_owned(),
            password: SecretString::from(ADMIN_PASSWORD),
        },
        SecretString::from(secret),
        Duration::hours(8),
    )
}

#[test]
fn test_session_valid_until_expiry() {
    let sessions = manager(SESSION_SECRET);
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
    let issued = sessions.login(ADMIN_USERNAME, ADMIN_PASSWORD, now).unwrap();
    assert_eq!(issued.expires_at, now + Duration::hours(8));

    let session = sessions.verify(&issued.token, now + Duration::hours(7)).unwrap();
    assert_eq!(session.username, ADMIN_USERNAME);
    assert!(sessions.verify(&issued.token, issued.expires_at).is_ok());
    assert_eq!(
        sessions.verify(&issued.token, issued.expires_at + Duration::seconds(1)),
        Err(AuthError::InvalidSession)
    );
}

#[test]
fn test_wrong_credentials_are_indistinguishable() {
    let sessions = manager(SESSION_SECRET);
    let now = Utc::now();
    let bad_user = sessions.login("root", ADMIN_PASSWORD, now).err();
    let bad_password = sessions.login(ADMIN_USERNAME, "nope", now).err();
    assert_eq!(bad_user, Some(AuthError::InvalidCredentials));
    assert_eq!(bad_user, bad_password);
}

#[test]
fn test_token_from_other_secret_is_rejected() {
    let now = Utc::now();
    let issued = manager("another-secret-with-plenty-of-bytes!")
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, now)
        .unwrap();
    assert!(manager(SESSION_SECRET).verify(&issued.token, now).is_err());
}

#[test]
fn test_tampered_claims_are_rejected() {
    let sessions = manager(SESSION_SECRET);
    let now = Utc::now();
    let issued = sessions.login(ADMIN_USERNAME, ADMIN_PASSWORD, now).unwrap();

    let parts: Vec<&str> = issued.token.split('.').collect();
    assert_eq!(parts.len(), 3);
    let mut forged = issued.token.clone();
    forged.insert(parts[0].len() + 2, 'A');

    assert!(sessions.verify(&forged, now).is_err());
    assert!(sessions.verify("", now).is_err());
    assert!(sessions.verify("a.b", now).is_err());
    assert!(sessions.verify(&format!("{}.x", issued.token), now).is_err());
}

#[test]
fn test_cookie_round_trip() {
    let sessions = manager(SESSION_SECRET);
    let issued = sessions
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, Utc::now())
        .unwrap();
    let cookie = sessions.session_cookie(issued.token.clone());
    assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
    assert_eq!(cookie.http_only(), Some(true));

    let header = format!("theme=dark; {}={}", cookie.name(), cookie.value());
    assert_eq!(token_from_cookie_header(&header), Some(issued.token));
    assert_eq!(token_from_cookie_header("theme=dark"), None);
}
