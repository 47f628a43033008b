//! Business logic services.
//!
//! # Services
//!
//! - `access` - Role resolution with configured admin fallback
//! - `bot` - Telegram command parsing and dispatch
//! - `settings` - Runtime-editable item rules

pub mod access;
pub mod bot;
pub mod settings;

pub use access::AccessControl;
pub use bot::{Command, Dispatcher, Reply, Update};
pub use settings::{SettingsError, SettingsStore};
