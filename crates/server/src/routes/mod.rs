//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database ping)
//! GET  /webhook/health         - Liveness for the webhook host
//!
//! # Telegram
//! POST /webhook/telegram       - Bot update (secret header checked first)
//!
//! # Admin (session cookie required except login)
//! POST /admin/login            - Issue session cookie
//! POST /admin/logout           - Clear session cookie
//! GET  /admin/dashboard        - User and item counters
//! GET  /admin/users            - List users
//! POST /admin/users            - Create user
//! POST /admin/users/role       - Change a user's role
//! POST /admin/users/delete     - Delete a user
//! GET  /admin/items            - Paged item browser
//! GET  /admin/settings         - Current item rules
//! POST /admin/settings         - Replace item rules
//! ```

pub mod admin;
pub mod health;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Build the complete router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(admin::router())
}
