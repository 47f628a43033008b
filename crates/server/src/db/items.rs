//! Item repository.
//!
//! Prices are encrypted before they reach SQL and decrypted only after a
//! query has completed. A row whose price cannot be decrypted is returned as
//! [`UnreadableItem`] instead of being dropped or defaulted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};

use stockbot_core::{
    AvailabilityFilter, ChatId, CodecError, FieldCipher, Item, ItemId, NewItem, Price,
    TelegramUserId,
};

use super::{RepositoryError, escape_like};

/// Rows per page in the admin item browser.
pub const PAGE_SIZE: i64 = 25;

// =============================================================================
// Query Types
// =============================================================================

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Filters for [`ItemRepository::get_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    /// Case-insensitive substring of `item_name`, matched literally.
    pub name_filter: Option<String>,
    pub time_range: Option<TimeRange>,
    pub limit: i64,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            name_filter: None,
            time_range: None,
            limit: 50,
        }
    }
}

/// A row whose encrypted fields could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableItem {
    pub id: ItemId,
    pub source: CodecError,
}

/// Result of reading one stored item.
pub type ItemRead = Result<Item, UnreadableItem>;

/// Parameters for the admin item browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemBrowse {
    /// 1-based page number; clamped into range.
    pub page: i64,
    pub search: Option<String>,
    pub availability: AvailabilityFilter,
}

/// One page of the admin item browser.
#[derive(Debug)]
pub struct ItemPage {
    pub items: Vec<ItemRead>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// Clamp a requested page into `[1, total_pages]`, returning `(page, total_pages)`.
///
/// An empty result still has one page.
#[must_use]
pub fn clamp_page(requested: i64, total: i64) -> (i64, i64) {
    let total_pages = ((total.max(0) + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
    (requested.clamp(1, total_pages), total_pages)
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    chat_id: i64,
    item_name: String,
    item_amount: i32,
    item_type: String,
    item_price: Option<String>,
    availability: bool,
    created_by_user_id: Option<i64>,
    timestamp: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self, item_price: Option<Price>) -> Item {
        Item {
            id: ItemId::new(self.id),
            chat_id: ChatId::new(self.chat_id),
            item_name: self.item_name,
            item_amount: self.item_amount,
            item_type: self.item_type,
            item_price,
            availability: self.availability,
            created_by_user_id: self.created_by_user_id.map(TelegramUserId::new),
            timestamp: self.timestamp,
        }
    }

    /// Decrypt the price and build the item.
    fn open(self, cipher: &FieldCipher) -> ItemRead {
        let id = ItemId::new(self.id);
        let price = cipher
            .decrypt_opt(self.item_price.as_deref())
            .and_then(|plain| {
                plain
                    .map(|p| Price::from_plaintext(&p).map_err(|_| CodecError::Decryption))
                    .transpose()
            })
            .map_err(|source| {
                warn!(item_id = %id, error = %source, "Stored item could not be decrypted");
                UnreadableItem { id, source }
            })?;
        Ok(self.into_item(price))
    }
}

const ITEM_COLUMNS: &str = "id, chat_id, item_name, item_amount, item_type, item_price, \
                            availability, created_by_user_id, timestamp";

// =============================================================================
// Repository
// =============================================================================

/// Repository for inventory items.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    /// Insert an item. The timestamp is assigned by the database.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Encryption` if the price cannot be encrypted,
    /// or `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, item), fields(chat_id = %chat_id))]
    pub async fn add_item(
        &self,
        chat_id: ChatId,
        item: NewItem,
        created_by: Option<TelegramUserId>,
    ) -> Result<Item, RepositoryError> {
        let sealed_price = self
            .cipher
            .encrypt_opt(item.item_price.map(|p| p.to_plaintext()).as_deref())
            .map_err(RepositoryError::Encryption)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r"
            INSERT INTO items (
                chat_id, item_name, item_amount, item_type, item_price,
                availability, created_by_user_id, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(chat_id.as_i64())
        .bind(&item.item_name)
        .bind(item.item_amount)
        .bind(&item.item_type)
        .bind(sealed_price)
        .bind(item.availability)
        .bind(created_by.map(|u| u.as_i64()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into_item(item.item_price))
    }

    /// Items in a chat, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails. Decryption
    /// failures are reported per row.
    #[instrument(skip(self, query), fields(chat_id = %chat_id))]
    pub async fn get_items(
        &self,
        chat_id: ChatId,
        query: &ItemQuery,
    ) -> Result<Vec<ItemRead>, RepositoryError> {
        let pattern = query
            .name_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| format!("%{}%", escape_like(f)));

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE chat_id = $1
              AND ($2::text IS NULL OR item_name ILIKE $2 ESCAPE '\')
              AND ($3::timestamptz IS NULL OR timestamp >= $3)
              AND ($4::timestamptz IS NULL OR timestamp <= $4)
            ORDER BY timestamp DESC, id DESC
            LIMIT $5
            "
        ))
        .bind(chat_id.as_i64())
        .bind(pattern)
        .bind(query.time_range.map(|r| r.from))
        .bind(query.time_range.map(|r| r.to))
        .bind(query.limit.max(0))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.open(self.cipher)).collect())
    }

    /// Set availability on every item in the chat with this name
    /// (case-insensitive). Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self, item_name), fields(chat_id = %chat_id))]
    pub async fn update_availability(
        &self,
        chat_id: ChatId,
        item_name: &str,
        availability: bool,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE items
            SET availability = $3
            WHERE chat_id = $1 AND LOWER(item_name) = LOWER($2)
            ",
        )
        .bind(chat_id.as_i64())
        .bind(item_name.trim())
        .bind(availability)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Delete every item in the chat with this name (case-insensitive).
    ///
    /// No matches is not an error; the count is simply zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    #[instrument(skip(self, item_name), fields(chat_id = %chat_id))]
    pub async fn delete_by_name_and_chat(
        &self,
        chat_id: ChatId,
        item_name: &str,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM items WHERE chat_id = $1 AND LOWER(item_name) = LOWER($2)")
                .bind(chat_id.as_i64())
                .bind(item_name.trim())
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Creator of every item in the chat with this name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn creators_by_name(
        &self,
        chat_id: ChatId,
        item_name: &str,
    ) -> Result<Vec<Option<TelegramUserId>>, RepositoryError> {
        let creators: Vec<Option<i64>> = sqlx::query_scalar(
            "SELECT created_by_user_id FROM items WHERE chat_id = $1 AND LOWER(item_name) = LOWER($2)",
        )
        .bind(chat_id.as_i64())
        .bind(item_name.trim())
        .fetch_all(self.pool)
        .await?;

        Ok(creators
            .into_iter()
            .map(|c| c.map(TelegramUserId::new))
            .collect())
    }

    /// Total number of items across all chats.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_items(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(self.pool)
            .await?)
    }

    /// Number of available items across all chats.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_available(&self) -> Result<i64, RepositoryError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE availability")
                .fetch_one(self.pool)
                .await?,
        )
    }

    /// Page through items in every chat for the admin panel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, browse))]
    pub async fn browse(&self, browse: &ItemBrowse) -> Result<ItemPage, RepositoryError> {
        let pattern = browse
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let availability = browse.availability.as_bool();

        let filter = r"
            ($1::text IS NULL OR item_name ILIKE $1 ESCAPE '\' OR item_type ILIKE $1 ESCAPE '\')
            AND ($2::boolean IS NULL OR availability = $2)
        ";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE {filter}"))
            .bind(pattern.as_deref())
            .bind(availability)
            .fetch_one(self.pool)
            .await?;

        let (page, total_pages) = clamp_page(browse.page, total);

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE {filter}
            ORDER BY timestamp DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(pattern.as_deref())
        .bind(availability)
        .bind(PAGE_SIZE)
        .bind((page - 1) * PAGE_SIZE)
        .fetch_all(self.pool)
        .await?;

        Ok(ItemPage {
            items: rows.into_iter().map(|row| row.open(self.cipher)).collect(),
            page,
            total_pages,
            total,
        })
    }
}
