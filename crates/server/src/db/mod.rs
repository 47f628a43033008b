//! Database operations for the inventory `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `roles` - Seeded role names (`admin`, `user`)
//! - `users` - Telegram users and their role
//! - `items` - Inventory entries, scoped by chat; `item_price` is ciphertext
//! - `schema_changelog` - Applied additive migrations
//!
//! The schema is created by [`schema::SchemaGuard`], never altered
//! implicitly at startup.

pub mod items;
pub mod schema;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use stockbot_core::CodecError;
use thiserror::Error;

pub use items::{
    ItemBrowse, ItemPage, ItemQuery, ItemRead, ItemRepository, TimeRange, UnreadableItem,
};
pub use schema::{SchemaError, SchemaGuard};
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate telegram id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The operation would leave no administrator.
    #[error("cannot remove or demote the last administrator")]
    LastAdmin,

    /// A targeted read found ciphertext it cannot open.
    #[error("decryption failed: {0}")]
    Decryption(CodecError),

    /// A value could not be encrypted before writing.
    #[error("encryption failed: {0}")]
    Encryption(CodecError),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` so user text matches literally inside `LIKE`.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
