//! Application state shared across handlers.

use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;

use stockbot_core::FieldCipher;

use crate::config::ServerConfig;
use crate::security::session::DEFAULT_SESSION_TTL_MINUTES;
use crate::security::{AdminCredentials, SessionManager, WebhookAuthenticator};
use crate::services::SettingsStore;

/// Application state shared across all handlers.
///
/// Everything except the item rules is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    sessions: SessionManager,
    webhook: WebhookAuthenticator,
    settings: SettingsStore,
}

impl AppState {
    /// Build state from loaded configuration.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool, settings: SettingsStore) -> Self {
        let sessions = SessionManager::new(
            AdminCredentials {
                username: config.admin.username.clone(),
                password: config.admin.password.clone(),
            },
            config.admin.session_secret.clone(),
            Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
        )
        .with_secure_cookies(config.is_https());
        let webhook = WebhookAuthenticator::new(config.webhook_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions,
                webhook,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cipher(&self) -> &FieldCipher {
        &self.inner.config.cipher
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    #[must_use]
    pub fn webhook(&self) -> &WebhookAuthenticator {
        &self.inner.webhook
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.inner.settings
    }
}
