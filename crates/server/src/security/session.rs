//! Stateless admin sessions.
//!
//! A session is an HS256 JWT carried in the `admin_token` cookie. Nothing is
//! stored server-side, so logging out only clears the cookie; a copied token
//! stays valid until it expires.
//!
//! Expiry is checked against the caller's clock rather than the system clock
//! so that verification is deterministic.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_sessions::cookie::{Cookie, SameSite, time};
use tracing::debug;

use super::{AuthError, SecretComparer};

/// Cookie carrying the admin session token.
pub const SESSION_COOKIE_NAME: &str = "admin_token";

/// Default session lifetime (8 hours).
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// The single configured administrator.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A freshly signed session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies admin session tokens.
#[derive(Clone)]
pub struct SessionManager {
    credentials: AdminCredentials,
    secret: SecretString,
    ttl: Duration,
    secure_cookies: bool,
    comparer: SecretComparer,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("credentials", &self.credentials)
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(credentials: AdminCredentials, secret: SecretString, ttl: Duration) -> Self {
        Self {
            credentials,
            secret,
            ttl,
            secure_cookies: false,
            comparer: SecretComparer::new(),
        }
    }

    /// Mark issued cookies `Secure` (for HTTPS deployments).
    #[must_use]
    pub const fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Check credentials and issue a token.
    ///
    /// Username and password are always both compared.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for any mismatch, including an
    /// empty configured password.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let expected_password = self.credentials.password.expose_secret();
        let username_ok = self
            .comparer
            .matches(self.credentials.username.as_bytes(), username.as_bytes());
        let password_ok = self
            .comparer
            .matches(expected_password.as_bytes(), password.as_bytes());

        if !(username_ok & password_ok & !expected_password.is_empty()) {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(now).ok_or(AuthError::InvalidCredentials)
    }

    fn issue(&self, now: DateTime<Utc>) -> Option<IssuedSession> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: self.credentials.username.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let token = encode(&Header::new(ALGORITHM), &claims, &key)
            .inspect_err(|e| tracing::error!(error = %e, "Failed to sign session token"))
            .ok()?;

        Some(IssuedSession { token, expires_at })
    }

    /// Verify a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidSession` for a malformed token, a bad
    /// signature, another algorithm, a foreign subject, or an expired session.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AdminSession, AuthError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let claims = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => debug!("Session token has a bad signature"),
                    ErrorKind::InvalidAlgorithm => debug!("Session token uses another algorithm"),
                    ErrorKind::InvalidSubject => debug!("Session token names another subject"),
                    kind => debug!(?kind, "Malformed session token"),
                }
                AuthError::InvalidSession
            })?
            .claims;

        if now.timestamp() > claims.exp {
            debug!(exp = claims.exp, "Session token expired");
            return Err(AuthError::InvalidSession);
        }

        Ok(AdminSession {
            issued_at: DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::InvalidSession)?,
            expires_at: DateTime::from_timestamp(claims.exp, 0)
                .ok_or(AuthError::InvalidSession)?,
            username: claims.sub,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // Expiry is compared against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.sub = Some(self.credentials.username.clone());
        validation
    }

    /// Cookie carrying `token`.
    #[must_use]
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .path("/")
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    /// Expired cookie that clears the session in the browser.
    #[must_use]
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.session_cookie(String::new());
        cookie.make_removal();
        cookie
    }
}

/// Extract the session token from a `Cookie` header value.
#[must_use]
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}
