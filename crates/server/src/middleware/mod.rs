//! HTTP middleware and extractors.
//!
//! Admin routes take [`RequireAdminSession`]; the webhook route checks its
//! shared secret itself so it can reject before reading the body.

pub mod auth;

pub use auth::RequireAdminSession;
