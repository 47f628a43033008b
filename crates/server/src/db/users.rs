//! User repository.
//!
//! Users are keyed by their Telegram id. Role changes and deletions refuse to
//! leave the system without an administrator; the admin rows are locked for
//! the duration of the check so two concurrent demotions cannot both pass.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use stockbot_core::{FieldCipher, Role, TelegramUserId, User, UserId};

use super::{RepositoryError, conflict_on_unique};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    telegram_user_id: i64,
    role_name: String,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
    has_credentials: bool,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role_name
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(format!("unknown role in database: {e}")))?;

        Ok(Self {
            id: UserId::new(row.id),
            telegram_user_id: TelegramUserId::new(row.telegram_user_id),
            role,
            display_name: row.display_name,
            created_at: row.created_at,
            has_credentials: row.has_credentials,
        })
    }
}

const USER_SELECT: &str = r"
    SELECT u.id, u.telegram_user_id, r.name AS role_name, u.display_name,
           u.created_at, (u.credentials_encrypted IS NOT NULL) AS has_credentials
    FROM users u
    JOIN roles r ON r.id = u.role_id
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for bot users.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    /// Most recently created users first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a role name is unknown.
    pub async fn list_users(&self, limit: i64) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} ORDER BY u.created_at DESC, u.id DESC LIMIT $1"
        ))
        .bind(limit.max(0))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a user by Telegram id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_telegram_id(
        &self,
        telegram_user_id: TelegramUserId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} WHERE u.telegram_user_id = $1"
        ))
        .bind(telegram_user_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a user with the given role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Telegram id already exists.
    /// Returns `RepositoryError::NotFound` if the role has not been seeded.
    #[instrument(skip(self, display_name), fields(telegram_user_id = %telegram_user_id))]
    pub async fn create_user(
        &self,
        telegram_user_id: TelegramUserId,
        role: Role,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let role_id = role_id(&mut tx, role).await?;

        sqlx::query(
            r"
            INSERT INTO users (telegram_user_id, role_id, display_name, created_at)
            VALUES ($1, $2, $3, NOW())
            ",
        )
        .bind(telegram_user_id.as_i64())
        .bind(role_id)
        .bind(display_name.map(str::trim).filter(|n| !n.is_empty()))
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "user"))?;

        let user = fetch_in_tx(&mut tx, telegram_user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(user)
    }

    /// Change a user's role. Returns `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::LastAdmin` when demoting the only admin.
    /// Returns `RepositoryError::NotFound` if the role has not been seeded.
    #[instrument(skip(self), fields(telegram_user_id = %telegram_user_id))]
    pub async fn set_role(
        &self,
        telegram_user_id: TelegramUserId,
        role: Role,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let admins = locked_admin_count(&mut tx).await?;
        let Some(current) = locked_role(&mut tx, telegram_user_id).await? else {
            return Ok(None);
        };
        if current == Role::Admin && role != Role::Admin && admins <= 1 {
            return Err(RepositoryError::LastAdmin);
        }

        let role_id = role_id(&mut tx, role).await?;
        sqlx::query("UPDATE users SET role_id = $2 WHERE telegram_user_id = $1")
            .bind(telegram_user_id.as_i64())
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let user = fetch_in_tx(&mut tx, telegram_user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::LastAdmin` when deleting the only admin.
    #[instrument(skip(self), fields(telegram_user_id = %telegram_user_id))]
    pub async fn delete_user(&self, telegram_user_id: TelegramUserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let admins = locked_admin_count(&mut tx).await?;
        let current = locked_role(&mut tx, telegram_user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if current == Role::Admin && admins <= 1 {
            return Err(RepositoryError::LastAdmin);
        }

        sqlx::query("DELETE FROM users WHERE telegram_user_id = $1")
            .bind(telegram_user_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Total number of users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_users(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?)
    }

    /// Number of users holding `role`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_role(&self, role: Role) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id WHERE r.name = $1",
        )
        .bind(role.as_str())
        .fetch_one(self.pool)
        .await?)
    }

    /// Role stored for a user, or `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the role name is unknown.
    pub async fn role_of(
        &self,
        telegram_user_id: TelegramUserId,
    ) -> Result<Option<Role>, RepositoryError> {
        let name: Option<String> = sqlx::query_scalar(
            r"
            SELECT r.name FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.telegram_user_id = $1
            ",
        )
        .bind(telegram_user_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        name.map(|n| {
            n.parse::<Role>()
                .map_err(|e| RepositoryError::DataCorruption(format!("unknown role in database: {e}")))
        })
        .transpose()
    }

    /// Encrypt and store an opaque credential payload for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Encryption` if encryption fails.
    #[instrument(skip(self, plaintext), fields(telegram_user_id = %telegram_user_id))]
    pub async fn store_credentials(
        &self,
        telegram_user_id: TelegramUserId,
        plaintext: &str,
    ) -> Result<(), RepositoryError> {
        let sealed = self
            .cipher
            .encrypt(plaintext)
            .map_err(RepositoryError::Encryption)?;

        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE users SET credentials_encrypted = $2 WHERE telegram_user_id = $1")
                .bind(telegram_user_id.as_i64())
                .bind(sealed)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Decrypted credential payload, or `None` if none is stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Decryption` if the payload cannot be opened.
    pub async fn credentials(
        &self,
        telegram_user_id: TelegramUserId,
    ) -> Result<Option<String>, RepositoryError> {
        let sealed: Option<Option<String>> = sqlx::query_scalar(
            "SELECT credentials_encrypted FROM users WHERE telegram_user_id = $1",
        )
        .bind(telegram_user_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        let sealed = sealed.ok_or(RepositoryError::NotFound)?;
        self.cipher
            .decrypt_opt(sealed.as_deref())
            .map_err(RepositoryError::Decryption)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn role_id(tx: &mut Transaction<'_, Postgres>, role: Role) -> Result<i32, RepositoryError> {
    sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
        .bind(role.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)
}

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    telegram_user_id: TelegramUserId,
) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "{USER_SELECT} WHERE u.telegram_user_id = $1"
    ))
    .bind(telegram_user_id.as_i64())
    .fetch_optional(&mut **tx)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Current role of a user, locking their row.
async fn locked_role(
    tx: &mut Transaction<'_, Postgres>,
    telegram_user_id: TelegramUserId,
) -> Result<Option<Role>, RepositoryError> {
    let name: Option<String> = sqlx::query_scalar(
        r"
        SELECT r.name FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE u.telegram_user_id = $1
        FOR UPDATE OF u
        ",
    )
    .bind(telegram_user_id.as_i64())
    .fetch_optional(&mut **tx)
    .await?;

    name.map(|n| {
        n.parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(format!("unknown role in database: {e}")))
    })
    .transpose()
}

/// Number of admins, locking every admin row in id order.
///
/// Role changes take this lock before touching their target row so that
/// concurrent demotions queue up instead of deadlocking.
async fn locked_admin_count(tx: &mut Transaction<'_, Postgres>) -> Result<usize, RepositoryError> {
    let ids: Vec<i32> = sqlx::query_scalar(
        r"
        SELECT u.id FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE r.name = $1
        ORDER BY u.id
        FOR UPDATE OF u
        ",
    )
    .bind(Role::Admin.as_str())
    .fetch_all(&mut **tx)
    .await?;

    Ok(ids.len())
}
