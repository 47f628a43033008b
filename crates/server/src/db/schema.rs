//! Schema creation and additive migrations.
//!
//! [`SchemaGuard::ensure`] only ever issues `CREATE ... IF NOT EXISTS` and
//! the idempotent role seed, so it is safe to run on every start against a
//! populated database. Column additions for databases created by older
//! releases are listed in [`ADDITIVE_MIGRATIONS`] and applied by an operator
//! through `stockbot-cli schema apply <id>`. Nothing here alters or drops
//! existing columns.

use sqlx::PgPool;
use stockbot_core::Role;
use thiserror::Error;
use tracing::{info, instrument};

/// Errors raised by the schema guard.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown migration: {0}")]
    UnknownMigration(String),

    #[error("migration {0} is already applied")]
    AlreadyApplied(String),

    #[error("refusing to run non-additive statement for {0}")]
    NotAdditive(String),
}

/// Statements run by [`SchemaGuard::ensure`], in order.
pub const CREATE_STATEMENTS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS roles (
        id SERIAL PRIMARY KEY,
        name VARCHAR(50) NOT NULL UNIQUE
    )",
    r"CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        telegram_user_id BIGINT NOT NULL UNIQUE,
        role_id INTEGER NOT NULL REFERENCES roles(id),
        display_name VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        credentials_encrypted TEXT
    )",
    r"CREATE TABLE IF NOT EXISTS items (
        id SERIAL PRIMARY KEY,
        chat_id BIGINT NOT NULL,
        item_name VARCHAR(255) NOT NULL,
        item_amount INTEGER NOT NULL,
        item_type VARCHAR(255) NOT NULL,
        item_price TEXT,
        availability BOOLEAN NOT NULL DEFAULT FALSE,
        created_by_user_id BIGINT,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    r"CREATE TABLE IF NOT EXISTS schema_changelog (
        id VARCHAR(100) PRIMARY KEY,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_items_chat_id ON items (chat_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_chat_name ON items (chat_id, LOWER(item_name))",
    "CREATE INDEX IF NOT EXISTS idx_items_timestamp ON items (timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_users_role_id ON users (role_id)",
];

/// A column addition for databases created before the column existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveMigration {
    pub id: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

impl AdditiveMigration {
    /// The `ALTER TABLE` statement for this migration.
    #[must_use]
    pub fn statement(&self) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            self.table, self.column, self.definition
        )
    }
}

/// Known additive migrations, oldest first.
pub const ADDITIVE_MIGRATIONS: &[AdditiveMigration] = &[
    AdditiveMigration {
        id: "0001_items_created_by_user_id",
        table: "items",
        column: "created_by_user_id",
        definition: "BIGINT",
    },
    AdditiveMigration {
        id: "0002_users_credentials_encrypted",
        table: "users",
        column: "credentials_encrypted",
        definition: "TEXT",
    },
    AdditiveMigration {
        id: "0003_users_display_name",
        table: "users",
        column: "display_name",
        definition: "VARCHAR(255)",
    },
];

/// Whether `sql` only creates objects that may already exist.
#[must_use]
pub fn is_create_only(sql: &str) -> bool {
    let normalized = normalize(sql);
    if normalized.contains(';') || keyword_count(&normalized, &DESTRUCTIVE) > 0 {
        return false;
    }
    if keyword_count(&normalized, &["ALTER"]) > 0 {
        return false;
    }
    normalized.starts_with("CREATE TABLE IF NOT EXISTS ")
        || normalized.starts_with("CREATE INDEX IF NOT EXISTS ")
        || normalized.starts_with("CREATE UNIQUE INDEX IF NOT EXISTS ")
}

/// Whether `sql` is a single `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`.
#[must_use]
pub fn is_additive(sql: &str) -> bool {
    let normalized = normalize(sql);
    if normalized.contains(';') || keyword_count(&normalized, &DESTRUCTIVE) > 0 {
        return false;
    }
    if keyword_count(&normalized, &["ALTER"]) != 1 {
        return false;
    }
    let Some(rest) = normalized.strip_prefix("ALTER TABLE ") else {
        return false;
    };
    rest.split_once(' ')
        .is_some_and(|(_table, tail)| tail.starts_with("ADD COLUMN IF NOT EXISTS "))
}

const DESTRUCTIVE: [&str; 4] = ["DROP", "TRUNCATE", "DELETE", "RENAME"];

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn keyword_count(normalized: &str, keywords: &[&str]) -> usize {
    normalized
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|word| keywords.contains(word))
        .count()
}

/// Creates and inspects the schema.
pub struct SchemaGuard<'a> {
    pool: &'a PgPool,
}

impl<'a> SchemaGuard<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables and indexes, then seed roles.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Database` if any statement fails; nothing is
    /// committed in that case.
    #[instrument(skip(self))]
    pub async fn ensure(&self) -> Result<(), SchemaError> {
        let mut tx = self.pool.begin().await?;

        for statement in CREATE_STATEMENTS {
            debug_assert!(is_create_only(statement));
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        for role in Role::ALL {
            sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Schema ensured");
        Ok(())
    }

    /// Additive migrations not yet recorded whose column is still missing.
    ///
    /// A column created by a current `CREATE TABLE` does not count as pending
    /// even without a changelog row.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Database` if the catalog queries fail.
    pub async fn pending(&self) -> Result<Vec<AdditiveMigration>, SchemaError> {
        let applied: Vec<String> = sqlx::query_scalar("SELECT id FROM schema_changelog")
            .fetch_all(self.pool)
            .await?;

        let mut pending = Vec::new();
        for migration in ADDITIVE_MIGRATIONS {
            if applied.iter().any(|id| id == migration.id) {
                continue;
            }
            if !self.column_exists(migration.table, migration.column).await? {
                pending.push(*migration);
            }
        }
        Ok(pending)
    }

    /// Apply one additive migration and record it in the changelog.
    ///
    /// # Errors
    ///
    /// - `UnknownMigration` if `id` is not in [`ADDITIVE_MIGRATIONS`]
    /// - `AlreadyApplied` if the changelog already lists it
    /// - `NotAdditive` if the generated statement fails the guard
    /// - `Database` on query failure (rolled back)
    #[instrument(skip(self))]
    pub async fn apply_additive(&self, id: &str) -> Result<AdditiveMigration, SchemaError> {
        let migration = ADDITIVE_MIGRATIONS
            .iter()
            .find(|m| m.id == id)
            .copied()
            .ok_or_else(|| SchemaError::UnknownMigration(id.to_owned()))?;

        let statement = migration.statement();
        if !is_additive(&statement) {
            return Err(SchemaError::NotAdditive(id.to_owned()));
        }

        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query("INSERT INTO schema_changelog (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        if recorded.rows_affected() == 0 {
            return Err(SchemaError::AlreadyApplied(id.to_owned()));
        }

        sqlx::query(&statement).execute(&mut *tx).await?;
        tx.commit().await?;

        info!(migration = id, "Applied additive migration");
        Ok(migration)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_schema = current_schema()
                  AND table_name = $1
                  AND column_name = $2
            )
            ",
        )
        .bind(table)
        .bind(column)
        .fetch_one(self.pool)
        .await
    }
}
