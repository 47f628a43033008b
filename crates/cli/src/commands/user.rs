//! Chat user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Register the first admin
//! stockbot-cli user create --telegram-id 123456789 --role admin --name "Ops"
//! ```
//!
//! # Environment Variables
//!
//! - `STOCKBOT_DATABASE_URL` - `PostgreSQL` connection string
//! - `ENCRYPTION_KEY` - Field encryption key

use stockbot_core::{Role, TelegramUserId, User};
use stockbot_server::db::{SchemaGuard, UserRepository};

use super::{CliError, cipher, connect};

/// Create a chat user, creating the schema first if needed.
pub async fn create_user(
    telegram_id: i64,
    role: &str,
    name: Option<&str>,
) -> Result<User, CliError> {
    let role: Role = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let cipher = cipher()?;
    let pool = connect().await?;

    SchemaGuard::new(&pool).ensure().await?;

    let user = UserRepository::new(&pool, &cipher)
        .create_user(TelegramUserId::new(telegram_id), role, name)
        .await?;

    tracing::info!(
        telegram_user_id = %user.telegram_user_id,
        role = %user.role,
        "User created"
    );
    Ok(user)
}
