//! Admin login and logout.

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    http::header,
    response::IntoResponse,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
}

/// Login form, accepted as JSON or urlencoded.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub expires_at: DateTime<Utc>,
}

async fn read_login(state: &AppState, request: Request) -> Result<LoginRequest, AppError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if is_json {
        Json::<LoginRequest>::from_request(request, state)
            .await
            .map(|Json(body)| body)
            .map_err(|e| AppError::BadRequest(e.body_text()))
    } else {
        Form::<LoginRequest>::from_request(request, state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| AppError::BadRequest(e.body_text()))
    }
}

/// Check credentials and set the session cookie.
///
/// POST /admin/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let body = read_login(&state, request).await?;

    let sessions = state.sessions();
    let issued = sessions
        .login(&body.username, &body.password, Utc::now())
        .inspect_err(|_| warn!("Admin login failed"))?;
    info!("Admin logged in");

    let cookie = sessions.session_cookie(issued.token);
    Ok((
        [(header::SET_COOKIE, cookie.to_string())],
        Json(LoginResponse {
            ok: true,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Clear the session cookie.
///
/// POST /admin/logout
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = state.sessions().removal_cookie();
    (
        [(header::SET_COOKIE, cookie.to_string())],
        Json(serde_json::json!({ "ok": true })),
    )
}
