//! Stockbot server library.
//!
//! Webhook receiver for the Telegram bot plus a small JSON admin API, built
//! as a library so the router can be exercised in tests.
//!
//! # Security
//!
//! - Item fields are encrypted at rest with the configured `ENCRYPTION_KEY`
//! - Webhook requests must carry the configured secret header
//! - Admin routes require a signed session cookie

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
