//! Schema commands.
//!
//! # Usage
//!
//! ```bash
//! # Create missing tables and seed roles
//! stockbot-cli schema ensure
//!
//! # List additive migrations that have not been applied
//! stockbot-cli schema pending
//!
//! # Apply one additive migration
//! stockbot-cli schema apply 0001_items_created_by_user_id
//! ```

use stockbot_server::db::SchemaGuard;

use super::{CliError, connect};

pub async fn ensure() -> Result<(), CliError> {
    let pool = connect().await?;
    SchemaGuard::new(&pool).ensure().await?;
    tracing::info!("Schema is up to date");
    Ok(())
}

pub async fn pending() -> Result<(), CliError> {
    let pool = connect().await?;
    let pending = SchemaGuard::new(&pool).pending().await?;

    if pending.is_empty() {
        tracing::info!("No pending migrations");
    }
    for migration in pending {
        tracing::info!(id = migration.id, "{}", migration.statement());
    }
    Ok(())
}

pub async fn apply(id: &str) -> Result<(), CliError> {
    let pool = connect().await?;
    let migration = SchemaGuard::new(&pool).apply_additive(id).await?;
    tracing::info!(id = migration.id, "Applied {}", migration.statement());
    Ok(())
}
