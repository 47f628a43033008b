//! Request authentication: webhook secret and admin sessions.

pub mod session;
pub mod webhook;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

pub use session::{AdminCredentials, AdminSession, IssuedSession, SESSION_COOKIE_NAME, SessionManager};
pub use webhook::{WEBHOOK_SECRET_HEADER, WebhookAuthenticator, WebhookDecision};

type HmacSha256 = Hmac<Sha256>;

/// Authentication failures. Messages are deliberately generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired session")]
    InvalidSession,
    #[error("webhook authentication failed")]
    WebhookRejected,
}

/// Compares secrets without leaking their contents or lengths through timing.
///
/// Both sides are reduced to HMAC-SHA256 tags under a key drawn once per
/// process, and the tags are compared with `Mac::verify_slice`.
#[derive(Clone)]
pub(crate) struct SecretComparer {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretComparer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretComparer").finish_non_exhaustive()
    }
}

impl SecretComparer {
    pub(crate) fn new() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    fn tag(&self, value: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(value);
        Some(mac)
    }

    /// Whether `provided` equals `expected`.
    pub(crate) fn matches(&self, expected: &[u8], provided: &[u8]) -> bool {
        let (Some(expected), Some(provided)) = (self.tag(expected), self.tag(provided)) else {
            return false;
        };
        provided
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok()
    }
}
