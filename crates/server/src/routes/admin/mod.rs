//! Admin JSON API.
//!
//! Every route except login and logout requires a valid session cookie and
//! checks the session role against the permission engine before touching
//! the database.

pub mod auth;
pub mod dashboard;
pub mod items;
pub mod settings;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the complete admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(users::router())
        .merge(items::router())
        .merge(settings::router())
}
