//! Stockbot Core - shared types, field encryption, and the permission engine.
//!
//! This crate is used by:
//! - `server` - Webhook receiver and admin HTTP API
//! - `cli` - Schema guard, user management, and key generation
//!
//! # Architecture
//!
//! The core crate performs no I/O: no database access, no HTTP clients, no
//! configuration loading. Everything here is synchronous and safe to share
//! across any number of concurrent requests.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, roles, items and users
//! - [`crypto`] - Field cipher for sensitive values at rest
//! - [`permissions`] - Role to action resolution, deny by default
//! - [`rules`] - Operator-editable item validation rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod crypto;
pub mod permissions;
pub mod rules;
pub mod types;

pub use crypto::{CodecError, FieldCipher};
pub use permissions::{Action, Decision, PermissionError};
pub use rules::ItemRules;
pub use types::*;
