//! CLI command implementations.

pub mod keygen;
pub mod schema;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use stockbot_core::{CodecError, FieldCipher};
use stockbot_server::db::{RepositoryError, SchemaError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema guard refused or failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// `ENCRYPTION_KEY` is not a valid key.
    #[error(transparent)]
    InvalidKey(#[from] CodecError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, user")]
    InvalidRole(String),
}

/// Connect using `STOCKBOT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOCKBOT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("STOCKBOT_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(stockbot_server::db::create_pool(&SecretString::from(database_url)).await?)
}

/// Cipher built from `ENCRYPTION_KEY`.
pub fn cipher() -> Result<FieldCipher, CliError> {
    dotenvy::dotenv().ok();

    let key =
        std::env::var("ENCRYPTION_KEY").map_err(|_| CliError::MissingEnvVar("ENCRYPTION_KEY"))?;
    Ok(FieldCipher::from_base64(&key)?)
}
