//! Telegram webhook secret check.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::SecretComparer;

/// Header Telegram sends with the secret configured via `setWebhook`.
pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Outcome of a webhook authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDecision {
    Authorized,
    Rejected,
}

/// Verifies the shared webhook secret.
///
/// With no secret configured every request is authorized; this is logged as a
/// warning once, when the authenticator is built.
#[derive(Debug, Clone)]
pub struct WebhookAuthenticator {
    secret: Option<SecretString>,
    comparer: SecretComparer,
}

impl WebhookAuthenticator {
    #[must_use]
    pub fn new(secret: Option<SecretString>) -> Self {
        let secret = secret.filter(|s| !s.expose_secret().is_empty());
        if secret.is_none() {
            warn!("WEBHOOK_SECRET is not set; webhook requests are accepted without authentication");
        }
        Self {
            secret,
            comparer: SecretComparer::new(),
        }
    }

    /// Whether a secret is configured.
    #[must_use]
    pub const fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the value of the secret header, if any was sent.
    #[must_use]
    pub fn authenticate(&self, provided: Option<&str>) -> WebhookDecision {
        let Some(expected) = &self.secret else {
            return WebhookDecision::Authorized;
        };
        let Some(provided) = provided else {
            debug!("Webhook request without secret header");
            return WebhookDecision::Rejected;
        };
        if self
            .comparer
            .matches(expected.expose_secret().as_bytes(), provided.as_bytes())
        {
            WebhookDecision::Authorized
        } else {
            WebhookDecision::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> WebhookAuthenticator {
        WebhookAuthenticator::new(Some(SecretString::from("s3cr3t-token")))
    }

    #[test]
    fn test_matching_secret_is_authorized() {
        assert_eq!(
            configured().authenticate(Some("s3cr3t-token")),
            WebhookDecision::Authorized
        );
    }

    #[test]
    fn test_wrong_or_missing_secret_is_rejected() {
        let auth = configured();
        assert_eq!(auth.authenticate(Some("s3cr3t")), WebhookDecision::Rejected);
        assert_eq!(auth.authenticate(Some("")), WebhookDecision::Rejected);
        assert_eq!(auth.authenticate(None), WebhookDecision::Rejected);
    }

    #[test]
    fn test_unconfigured_authorizes_everything() {
        let auth = WebhookAuthenticator::new(None);
        assert!(!auth.is_enforced());
        assert_eq!(auth.authenticate(None), WebhookDecision::Authorized);
        assert_eq!(auth.authenticate(Some("x")), WebhookDecision::Authorized);
    }

    #[test]
    fn test_empty_secret_counts_as_unconfigured() {
        let auth = WebhookAuthenticator::new(Some(SecretString::from("")));
        assert!(!auth.is_enforced());
        assert_eq!(auth.authenticate(None), WebhookDecision::Authorized);
    }
}
