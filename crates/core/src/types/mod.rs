//! Core domain types for Stockbot.
//!
//! This module provides type-safe wrappers for ids, prices, roles, and the
//! item and user records shared by the server and CLI.

pub mod id;
pub mod item;
pub mod price;
pub mod role;

pub use id::*;
pub use item::{AvailabilityFilter, Item, NewItem, User};
pub use price::{Price, PriceError};
pub use role::Role;
