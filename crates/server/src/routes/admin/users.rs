//! Admin user management.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use stockbot_core::{Action, Role, TelegramUserId, User};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::RequireAdminSession;
use crate::state::AppState;

/// Upper bound on users returned by the list endpoint.
const USER_LIST_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/role", post(set_role))
        .route("/admin/users/delete", post(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub telegram_id: TelegramUserId,
    #[serde(default)]
    pub role: Role,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub telegram_id: TelegramUserId,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub telegram_id: TelegramUserId,
}

/// GET /admin/users
async fn list_users(
    session: RequireAdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    session.authorize(Action::ViewUsers)?;

    let users = UserRepository::new(state.pool(), state.cipher())
        .list_users(USER_LIST_LIMIT)
        .await?;
    Ok(Json(users))
}

/// POST /admin/users
#[instrument(skip_all, fields(telegram_user_id = %body.telegram_id))]
async fn create_user(
    session: RequireAdminSession,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    session.authorize(Action::ManageUsers)?;

    let user = UserRepository::new(state.pool(), state.cipher())
        .create_user(body.telegram_id, body.role, body.display_name.as_deref())
        .await?;
    info!(role = %user.role, "User created from admin panel");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /admin/users/role
#[instrument(skip_all, fields(telegram_user_id = %body.telegram_id, role = %body.role))]
async fn set_role(
    session: RequireAdminSession,
    State(state): State<AppState>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<User>, AppError> {
    session.authorize(Action::ManageUsers)?;

    UserRepository::new(state.pool(), state.cipher())
        .set_role(body.telegram_id, body.role)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {}", body.telegram_id)))
}

/// POST /admin/users/delete
#[instrument(skip_all, fields(telegram_user_id = %body.telegram_id))]
async fn delete_user(
    session: RequireAdminSession,
    State(state): State<AppState>,
    Json(body): Json<DeleteUserRequest>,
) -> Result<Json<Value>, AppError> {
    session.authorize(Action::ManageUsers)?;

    UserRepository::new(state.pool(), state.cipher())
        .delete_user(body.telegram_id)
        .await?;
    info!("User deleted from admin panel");
    Ok(Json(json!({ "ok": true })))
}
