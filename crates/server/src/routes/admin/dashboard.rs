//! Admin dashboard counters.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use stockbot_core::Action;

use crate::db::{ItemRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdminSession;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_items: i64,
    pub available_items: i64,
}

/// GET /admin/dashboard
async fn dashboard(
    session: RequireAdminSession,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    session.authorize(Action::ViewDashboard)?;

    let users = UserRepository::new(state.pool(), state.cipher());
    let items = ItemRepository::new(state.pool(), state.cipher());
    let (total_users, total_items, available_items) = tokio::try_join!(
        users.count_users(),
        items.count_items(),
        items.count_available(),
    )?;

    Ok(Json(DashboardStats {
        total_users,
        total_items,
        available_items,
    }))
}
