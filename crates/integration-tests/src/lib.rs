//! Integration tests for Stockbot.
//!
//! # Running Tests
//!
//! ```bash
//! # Tests that need no database
//! cargo test -p stockbot-integration-tests
//!
//! # Include the PostgreSQL-backed tests
//! STOCKBOT_TEST_DATABASE_URL=postgres://localhost/stockbot_test \
//!     cargo test -p stockbot-integration-tests -- --include-ignored --test-threads=1
//! ```
//!
//! # Test Categories
//!
//! - `codec`, `permissions`, `sessions`, `webhook`, `config` - pure, no I/O
//! - `admin_http` - router driven with `tower::ServiceExt::oneshot`
//! - `repository`, `schema` - require `STOCKBOT_TEST_DATABASE_URL`

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use stockbot_core::FieldCipher;
use stockbot_server::config::ServerConfig;
use stockbot_server::db::SchemaGuard;
use stockbot_server::services::SettingsStore;
use stockbot_server::state::AppState;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";
pub const SESSION_SECRET: &str = "Zq8!rT3@vL6#nB1$xK4%mW7^pD2&hG9*";
pub const WEBHOOK_SECRET: &str = "webhook-shared-token";

/// Environment for a working configuration with a fresh encryption key.
#[must_use]
pub fn test_env() -> HashMap<String, String> {
    [
        ("STOCKBOT_DATABASE_URL", "postgres://stockbot@127.0.0.1:1/stockbot".to_owned()),
        ("ENCRYPTION_KEY", FieldCipher::generate_key()),
        ("ADMIN_USERNAME", ADMIN_USERNAME.to_owned()),
        ("ADMIN_PASSWORD", ADMIN_PASSWORD.to_owned()),
        ("ADMIN_SESSION_SECRET", SESSION_SECRET.to_owned()),
        ("WEBHOOK_SECRET", WEBHOOK_SECRET.to_owned()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect()
}

/// Load a configuration from `env`.
pub fn load_config(
    env: &HashMap<String, String>,
) -> Result<ServerConfig, stockbot_server::config::ConfigError> {
    ServerConfig::from_lookup(|key| env.get(key).cloned())
}

/// A pool that never connects; queries fail after a short timeout.
#[must_use]
pub fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(50))
        .connect_lazy("postgres://stockbot@127.0.0.1:1/stockbot")
        .expect("lazy pool")
}

/// Application state over [`unreachable_pool`].
#[must_use]
pub fn offline_state() -> AppState {
    let config = load_config(&test_env()).expect("test config");
    let settings = SettingsStore::in_memory(config.item_rules.clone());
    AppState::new(config, unreachable_pool(), settings)
}

/// Connect to `STOCKBOT_TEST_DATABASE_URL`, reset the tables, and create
/// the schema.
pub async fn fresh_database() -> PgPool {
    let url = std::env::var("STOCKBOT_TEST_DATABASE_URL")
        .expect("STOCKBOT_TEST_DATABASE_URL must be set for database tests");
    let pool = stockbot_server::db::create_pool(&SecretString::from(url))
        .await
        .expect("connect to test database");

    sqlx::query("DROP TABLE IF EXISTS items, users, roles, schema_changelog CASCADE")
        .execute(&pool)
        .await
        .expect("reset test database");
    SchemaGuard::new(&pool)
        .ensure()
        .await
        .expect("create schema");
    pool
}

/// A fresh random cipher.
#[must_use]
pub fn random_cipher() -> FieldCipher {
    FieldCipher::from_base64(&FieldCipher::generate_key()).expect("generated key is valid")
}
