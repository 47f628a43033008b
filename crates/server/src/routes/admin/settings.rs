//! Item rules editing.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use stockbot_core::{Action, ItemRules};

use crate::error::AppError;
use crate::middleware::RequireAdminSession;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/settings", get(show_settings).post(update_settings))
}

/// GET /admin/settings
async fn show_settings(
    session: RequireAdminSession,
    State(state): State<AppState>,
) -> Result<Json<ItemRules>, AppError> {
    session.authorize(Action::ManageSettings)?;
    Ok(Json(state.settings().current().await))
}

/// POST /admin/settings
#[instrument(skip_all)]
async fn update_settings(
    session: RequireAdminSession,
    State(state): State<AppState>,
    Json(rules): Json<ItemRules>,
) -> Result<Json<ItemRules>, AppError> {
    session.authorize(Action::ManageSettings)?;
    Ok(Json(state.settings().update(rules).await?))
}
