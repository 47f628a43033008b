//! Inventory items and chat users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChatId, ItemId, TelegramUserId, UserId};
use super::price::Price;
use super::role::Role;

/// A tracked inventory entry.
///
/// `item_name` and `chat_id` are stored in plaintext because they are lookup
/// keys. `item_price` only ever reaches storage as ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub chat_id: ChatId,
    pub item_name: String,
    pub item_amount: i32,
    pub item_type: String,
    pub item_price: Option<Price>,
    pub availability: bool,
    /// Set once at creation; never updated.
    pub created_by_user_id: Option<TelegramUserId>,
    /// Creation time, assigned by the database.
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied when adding an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub item_name: String,
    pub item_amount: i32,
    pub item_type: String,
    #[serde(default)]
    pub item_price: Option<Price>,
    #[serde(default)]
    pub availability: bool,
}

/// A user known to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub telegram_user_id: TelegramUserId,
    pub role: Role,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Whether an encrypted credential payload is stored. The payload itself
    /// is never part of this type.
    pub has_credentials: bool,
}

/// Availability filter for admin item browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityFilter {
    #[default]
    All,
    Yes,
    No,
}

impl AvailabilityFilter {
    /// The availability value to match, or `None` for no filter.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Yes => Some(true),
            Self::No => Some(false),
        }
    }
}
