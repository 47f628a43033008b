//! Telegram command dispatcher.
//!
//! Every command goes through the same steps. The actor's role is resolved,
//! then [`Dispatcher::authorize`] runs as a pure check. Mutating commands
//! also need the working-hours gate and, for non-admins, ownership of every
//! matching item. Only then is the repository touched.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

use stockbot_core::rules::parse_optional_price;
use stockbot_core::{
    Action, ChatId, Decision, FieldCipher, ItemRules, NewItem, Role, TelegramUserId, permissions,
};

use crate::db::{ItemQuery, ItemRead, ItemRepository, RepositoryError, UserRepository};
use crate::services::access::AccessControl;

/// Most items listed by `/items`.
pub const ITEM_LIST_LIMIT: i64 = 50;

/// Telegram rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 4000;

pub const DENIED: &str = "You are not allowed to do that.";
pub const OUTSIDE_HOURS: &str =
    "You are trying to send request outside of working hours - please try again later.";
pub const FAILED: &str = "Failed to process the request. Please try again later.";

pub const HELP: &str = "\
Hi! I'm the organizer bot. I keep track of your items.

/items [name] - list items, optionally filtered by name
/add name; amount; type; price or -; yes|no - add an item
/available name yes|no - change availability
/remove name - remove items with this name

Admins only:
/role <telegram_id> <admin|user> - change a user's role
/adduser <telegram_id> [admin|user] - register a user";

// =============================================================================
// Telegram Types
// =============================================================================

/// The subset of a Telegram `Update` the bot reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<serde_json::Value>,
    #[serde(default)]
    pub callback_query: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: TelegramUserId,
}

/// Reply returned in the webhook response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub method: &'static str,
    pub chat_id: ChatId,
    pub text: String,
}

impl Reply {
    #[must_use]
    pub fn send_message(chat_id: ChatId, text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.chars().count() > MAX_MESSAGE_CHARS {
            text = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
            text.push('…');
        }
        Self {
            method: "sendMessage",
            chat_id,
            text,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Items { filter: Option<String> },
    Add(NewItem),
    Available { name: String, availability: bool },
    Remove { name: String },
    SetRole { telegram_user_id: TelegramUserId, role: Role },
    AddUser { telegram_user_id: TelegramUserId, role: Role },
    Unknown(String),
}

/// A command that was recognised but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

fn usage(text: &str) -> UsageError {
    UsageError(format!("Usage: {text}"))
}

fn parse_yes_no(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

impl Command {
    /// Parse message text. Returns `Ok(None)` for text that is not a command.
    ///
    /// # Errors
    ///
    /// Returns `UsageError` with the expected syntax for malformed arguments.
    pub fn parse(text: &str) -> Result<Option<Self>, UsageError> {
        let text = text.trim();
        if !text.starts_with('/') {
            return Ok(None);
        }
        let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let rest = rest.trim();
        // "/items@my_bot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        let command = match name.as_str() {
            "/start" | "/help" => Self::Help,
            "/items" => Self::Items {
                filter: (!rest.is_empty()).then(|| rest.to_owned()),
            },
            "/add" => Self::Add(parse_add(rest)?),
            "/available" => {
                let err = || usage("/available name yes|no");
                let (name, value) = rest.rsplit_once(char::is_whitespace).ok_or_else(err)?;
                let availability = parse_yes_no(value).ok_or_else(err)?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(err());
                }
                Self::Available {
                    name: name.to_owned(),
                    availability,
                }
            }
            "/remove" => {
                if rest.is_empty() {
                    return Err(usage("/remove name"));
                }
                Self::Remove {
                    name: rest.to_owned(),
                }
            }
            "/role" => {
                let err = || usage("/role <telegram_id> <admin|user>");
                let mut args = rest.split_whitespace();
                let telegram_user_id = args.next().and_then(|a| a.parse().ok()).ok_or_else(err)?;
                let role = args.next().and_then(|a| a.parse().ok()).ok_or_else(err)?;
                if args.next().is_some() {
                    return Err(err());
                }
                Self::SetRole {
                    telegram_user_id,
                    role,
                }
            }
            "/adduser" => {
                let err = || usage("/adduser <telegram_id> [admin|user]");
                let mut args = rest.split_whitespace();
                let telegram_user_id = args.next().and_then(|a| a.parse().ok()).ok_or_else(err)?;
                let role = match args.next() {
                    Some(r) => r.parse().map_err(|_| err())?,
                    None => Role::User,
                };
                if args.next().is_some() {
                    return Err(err());
                }
                Self::AddUser {
                    telegram_user_id,
                    role,
                }
            }
            _ => Self::Unknown(name.clone()),
        };
        Ok(Some(command))
    }

    /// The permission this command needs, if any.
    #[must_use]
    pub const fn action(&self) -> Option<Action> {
        match self {
            Self::Help | Self::Unknown(_) => None,
            Self::Items { .. } => Some(Action::ViewItems),
            Self::Add(_) => Some(Action::AddItem),
            Self::Available { .. } => Some(Action::UpdateAvailability),
            Self::Remove { .. } => Some(Action::DeleteItem),
            Self::SetRole { .. } | Self::AddUser { .. } => Some(Action::ManageUsers),
        }
    }

    /// Whether the command changes items and is subject to working hours.
    #[must_use]
    pub const fn is_item_mutation(&self) -> bool {
        matches!(
            self,
            Self::Add(_) | Self::Available { .. } | Self::Remove { .. }
        )
    }
}

fn parse_add(rest: &str) -> Result<NewItem, UsageError> {
    let err = || usage("/add name; amount; type; price or -; yes|no");
    let fields: Vec<&str> = rest.split(';').map(str::trim).collect();
    let [name, amount, item_type, price, availability] = fields.as_slice() else {
        return Err(err());
    };
    let item_amount = amount
        .parse::<i32>()
        .map_err(|_| UsageError(format!("{amount} is invalid. Amount must be a whole number.")))?;
    let item_price = parse_optional_price(price)
        .map_err(|_| UsageError(format!("{price} is invalid. Price must be a number or -.")))?;
    let availability = parse_yes_no(availability)
        .ok_or_else(|| UsageError("Incorrect value, must be yes/no".to_owned()))?;

    Ok(NewItem {
        item_name: name.to_uppercase(),
        item_amount,
        item_type: (*item_type).to_owned(),
        item_price,
        availability,
    })
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Executes commands for one webhook request.
pub struct Dispatcher<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
    rules: ItemRules,
    working_hours_zone: Tz,
    fallback_admins: &'a [TelegramUserId],
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        cipher: &'a FieldCipher,
        rules: ItemRules,
        working_hours_zone: Tz,
        fallback_admins: &'a [TelegramUserId],
    ) -> Self {
        Self {
            pool,
            cipher,
            rules,
            working_hours_zone,
            fallback_admins,
        }
    }

    /// Whether `role` may run `command` at all. Ownership is checked later.
    #[must_use]
    pub fn authorize(command: &Command, role: Role) -> Decision {
        command
            .action()
            .map_or(Decision::Allow, |action| permissions::resolve(role, action))
    }

    /// Handle one update, returning the reply to send, if any.
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    pub async fn handle(&self, update: Update, now: DateTime<Utc>) -> Option<Reply> {
        let Some(message) = update.message else {
            if update.edited_message.is_some() {
                debug!("Ignoring edited message");
            } else if update.callback_query.is_some() {
                debug!("Ignoring callback query");
            } else {
                debug!("Ignoring unsupported update");
            }
            return None;
        };
        let chat_id = message.chat.id;
        let (Some(text), Some(sender)) = (message.text, message.from) else {
            return None;
        };

        let command = match Command::parse(&text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => return Some(Reply::send_message(chat_id, e.0)),
        };

        let role = AccessControl::new(self.pool, self.cipher, self.fallback_admins)
            .role_of(sender.id)
            .await;

        Some(Reply::send_message(
            chat_id,
            self.dispatch(command, chat_id, sender.id, role, now).await,
        ))
    }

    /// Run a parsed command for an actor whose role is already known.
    pub async fn dispatch(
        &self,
        command: Command,
        chat_id: ChatId,
        actor: TelegramUserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> String {
        if Self::authorize(&command, role) == Decision::Deny {
            info!(%chat_id, %actor, %role, action = ?command.action(), "Command denied");
            return DENIED.to_owned();
        }
        if command.is_item_mutation()
            && !self
                .rules
                .within_working_hours(now, &self.working_hours_zone)
        {
            return OUTSIDE_HOURS.to_owned();
        }

        match self.execute(command, chat_id, actor, role).await {
            Ok(text) => text,
            Err(e) => {
                error!(%chat_id, error = %e, "Command failed");
                sentry::capture_error(&e);
                FAILED.to_owned()
            }
        }
    }

    async fn execute(
        &self,
        command: Command,
        chat_id: ChatId,
        actor: TelegramUserId,
        role: Role,
    ) -> Result<String, RepositoryError> {
        let items = ItemRepository::new(self.pool, self.cipher);
        let users = UserRepository::new(self.pool, self.cipher);

        match command {
            Command::Help => Ok(HELP.to_owned()),
            Command::Unknown(name) => Ok(format!("Unknown command {name}. Send /help for usage.")),
            Command::Items { filter } => {
                let query = ItemQuery {
                    name_filter: filter,
                    limit: ITEM_LIST_LIMIT,
                    ..ItemQuery::default()
                };
                Ok(format_item_list(&items.get_items(chat_id, &query).await?))
            }
            Command::Add(new_item) => {
                let new_item = match self.rules.validate_new_item(new_item) {
                    Ok(item) => item,
                    Err(violation) => return Ok(format!("{violation}.")),
                };
                let item = items.add_item(chat_id, new_item, Some(actor)).await?;
                info!(%chat_id, item_id = %item.id, "Item added");
                Ok(format!(
                    "Request is placed for processing:\nItem name: {}\nAmount of items: {}\nItem type: {}\nItem price: {}\nAvailability: {}",
                    item.item_name,
                    item.item_amount,
                    item.item_type,
                    item.item_price.map_or_else(|| "-".to_owned(), |p| p.to_string()),
                    yes_no(item.availability),
                ))
            }
            Command::Available { name, availability } => {
                if let Some(refusal) = self.check_ownership(&items, chat_id, &name, actor, role).await? {
                    return Ok(refusal);
                }
                let updated = items.update_availability(chat_id, &name, availability).await?;
                Ok(format!(
                    "Update availability status.\nItem {name}: {updated} updated.\nAvailability - {}",
                    if availability { "available" } else { "not available" }
                ))
            }
            Command::Remove { name } => {
                if let Some(refusal) = self.check_ownership(&items, chat_id, &name, actor, role).await? {
                    return Ok(refusal);
                }
                let removed = items.delete_by_name_and_chat(chat_id, &name).await?;
                Ok(format!("Removed {removed} item(s) named {name}."))
            }
            Command::SetRole {
                telegram_user_id,
                role: new_role,
            } => match users.set_role(telegram_user_id, new_role).await {
                Ok(Some(user)) => Ok(format!("User {} is now {}.", user.telegram_user_id, user.role)),
                Ok(None) => Ok(format!("User {telegram_user_id} not found.")),
                Err(RepositoryError::LastAdmin) => Ok("Cannot demote the last admin.".to_owned()),
                Err(e) => Err(e),
            },
            Command::AddUser {
                telegram_user_id,
                role: new_role,
            } => match users.create_user(telegram_user_id, new_role, None).await {
                Ok(user) => Ok(format!("User {} added as {}.", user.telegram_user_id, user.role)),
                Err(RepositoryError::Conflict(_)) => {
                    Ok(format!("User {telegram_user_id} already exists."))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// `Some(reply)` when the actor may not touch every item with this name.
    async fn check_ownership(
        &self,
        items: &ItemRepository<'_>,
        chat_id: ChatId,
        name: &str,
        actor: TelegramUserId,
        role: Role,
    ) -> Result<Option<String>, RepositoryError> {
        if permissions::resolve(role, Action::ManageAnyItem).is_allowed() {
            return Ok(None);
        }
        let creators = items.creators_by_name(chat_id, name).await?;
        if creators.is_empty() {
            return Ok(Some(format!("Item {name} not found.")));
        }
        let all_owned = creators
            .into_iter()
            .all(|created_by| permissions::can_manage_item(role, actor, created_by).is_allowed());
        Ok((!all_owned).then(|| DENIED.to_owned()))
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Render `/items` output. Unreadable rows are listed, never hidden.
#[must_use]
pub fn format_item_list(items: &[ItemRead]) -> String {
    if items.is_empty() {
        return "No items found.".to_owned();
    }
    let lines: Vec<String> = items
        .iter()
        .map(|read| match read {
            Ok(item) => format!(
                "#{} {} x{} ({}) price: {} available: {}",
                item.id,
                item.item_name,
                item.item_amount,
                item.item_type,
                item.item_price.map_or_else(|| "-".to_owned(), |p| p.to_string()),
                yes_no(item.availability),
            ),
            Err(unreadable) => format!(
                "#{}: unreadable (encrypted with a different key)",
                unreadable.id
            ),
        })
        .collect();
    format!("Items in the database:\n{}", lines.join("\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use sqlx::postgres::PgPoolOptions;
    use stockbot_core::{CodecError, Item, ItemId, Price};

    use super::*;
    use crate::db::UnreadableItem;

    fn parse(text: &str) -> Command {
        Command::parse(text).unwrap().unwrap()
    }

    #[test]
    fn test_parse_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello there").unwrap(), None);
    }

    #[test]
    fn test_parse_items() {
        assert_eq!(parse("/items"), Command::Items { filter: None });
        assert_eq!(
            parse("/items@stock_bot  bolt m8 "),
            Command::Items {
                filter: Some("bolt m8".to_owned())
            }
        );
    }

    #[test]
    fn test_parse_add() {
        let Command::Add(item) = parse("/add bolt m8; 12; Spare Part; 1,5; yes") else {
            panic!("expected add");
        };
        assert_eq!(item.item_name, "BOLT M8");
        assert_eq!(item.item_amount, 12);
        assert_eq!(item.item_type, "Spare Part");
        assert_eq!(item.item_price, Some(Price::from_plaintext("1.5").unwrap()));
        assert!(item.availability);

        let Command::Add(item) = parse("/add nut; 1; miscellaneous; -; no") else {
            panic!("expected add");
        };
        assert_eq!(item.item_price, None);
        assert!(!item.availability);
    }

    #[test]
    fn test_parse_add_errors() {
        assert!(Command::parse("/add bolt; 12").is_err());
        assert!(Command::parse("/add bolt; many; part; -; yes").is_err());
        assert!(Command::parse("/add bolt; 1; part; cheap; yes").is_err());
        assert!(Command::parse("/add bolt; 1; part; -; maybe").is_err());
    }

    #[test]
    fn test_parse_available_and_remove() {
        assert_eq!(
            parse("/available big bolt no"),
            Command::Available {
                name: "big bolt".to_owned(),
                availability: false
            }
        );
        assert!(Command::parse("/available bolt").is_err());
        assert!(Command::parse("/available yes").is_err());
        assert_eq!(
            parse("/remove big bolt"),
            Command::Remove {
                name: "big bolt".to_owned()
            }
        );
        assert!(Command::parse("/remove").is_err());
    }

    #[test]
    fn test_parse_user_commands() {
        assert_eq!(
            parse("/role 42 admin"),
            Command::SetRole {
                telegram_user_id: TelegramUserId::new(42),
                role: Role::Admin
            }
        );
        assert_eq!(
            parse("/adduser 7"),
            Command::AddUser {
                telegram_user_id: TelegramUserId::new(7),
                role: Role::User
            }
        );
        assert!(Command::parse("/role 42").is_err());
        assert!(Command::parse("/role abc admin").is_err());
        assert!(Command::parse("/adduser 7 root").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("/Frobnicate x"), Command::Unknown("/frobnicate".to_owned()));
    }

    #[test]
    fn test_authorize_is_role_based() {
        let set_role = parse("/role 1 admin");
        assert_eq!(Dispatcher::authorize(&set_role, Role::User), Decision::Deny);
        assert_eq!(Dispatcher::authorize(&set_role, Role::Admin), Decision::Allow);
        assert_eq!(
            Dispatcher::authorize(&parse("/adduser 1"), Role::User),
            Decision::Deny
        );
        for text in ["/items", "/remove x", "/available x yes", "/help"] {
            assert_eq!(
                Dispatcher::authorize(&parse(text), Role::User),
                Decision::Allow,
                "{text}"
            );
        }
    }

    #[tokio::test]
    async fn test_denied_command_never_reaches_repository() {
        // Any repository call would time out and yield the generic failure reply.
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let cipher = FieldCipher::from_base64(&FieldCipher::generate_key()).unwrap();
        let dispatcher = Dispatcher::new(
            &pool,
            &cipher,
            ItemRules::default(),
            Tz::UTC,
            &[],
        );

        let reply = dispatcher
            .dispatch(
                parse("/role 99 admin"),
                ChatId::new(1),
                TelegramUserId::new(5),
                Role::User,
                Utc::now(),
            )
            .await;
        assert_eq!(reply, DENIED);

        let reply = dispatcher
            .dispatch(
                parse("/items"),
                ChatId::new(1),
                TelegramUserId::new(5),
                Role::User,
                Utc::now(),
            )
            .await;
        assert_eq!(reply, FAILED);
    }

    #[tokio::test]
    async fn test_mutations_respect_working_hours() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let cipher = FieldCipher::from_base64(&FieldCipher::generate_key()).unwrap();
        let rules = ItemRules {
            skip_working_hours: false,
            ..ItemRules::default()
        };
        let dispatcher = Dispatcher::new(&pool, &cipher, rules, Tz::Europe__Lisbon, &[]);
        // 2026-10-17 is a Saturday.
        let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

        let reply = dispatcher
            .dispatch(
                parse("/remove bolt"),
                ChatId::new(1),
                TelegramUserId::new(5),
                Role::Admin,
                saturday,
            )
            .await;
        assert_eq!(reply, OUTSIDE_HOURS);

        let reply = dispatcher
            .dispatch(
                parse("/help"),
                ChatId::new(1),
                TelegramUserId::new(5),
                Role::User,
                saturday,
            )
            .await;
        assert_eq!(reply, HELP);
    }

    #[test]
    fn test_format_item_list_includes_unreadable_rows() {
        let item = Item {
            id: ItemId::new(1),
            chat_id: ChatId::new(1),
            item_name: "BOLT".to_owned(),
            item_amount: 2,
            item_type: "spare part".to_owned(),
            item_price: Some(Price::from_plaintext("3").unwrap()),
            availability: true,
            created_by_user_id: None,
            timestamp: Utc::now(),
        };
        let reads = vec![
            Ok(item),
            Err(UnreadableItem {
                id: ItemId::new(2),
                source: CodecError::Decryption,
            }),
        ];
        let text = format_item_list(&reads);
        assert!(text.contains("#1 BOLT x2 (spare part) price: 3.00 available: yes"));
        assert!(text.contains("#2: unreadable (encrypted with a different key)"));
        assert_eq!(format_item_list(&[]), "No items found.");
    }

    #[test]
    fn test_update_deserializes() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"message":{"message_id":3,"chat":{"id":-100,"type":"group"},"from":{"id":42,"is_bot":false},"text":"/items"}}"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, ChatId::new(-100));
        assert_eq!(message.from.unwrap().id, TelegramUserId::new(42));
        assert_eq!(message.text.as_deref(), Some("/items"));
    }

    #[test]
    fn test_reply_body() {
        let reply = Reply::send_message(ChatId::new(9), "hi");
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"method": "sendMessage", "chat_id": 9, "text": "hi"})
        );
        let long = Reply::send_message(ChatId::new(9), "x".repeat(5000));
        assert_eq!(long.text.chars().count(), MAX_MESSAGE_CHARS);
    }
}
