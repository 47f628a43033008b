//! Telegram webhook endpoint.
//!
//! The secret header is checked before the body is read. Replies are sent
//! back in the response body as a `sendMessage` call, so the bot never makes
//! outbound requests.

use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::AppError;
use crate::security::{AuthError, WEBHOOK_SECRET_HEADER, WebhookDecision};
use crate::services::{Dispatcher, Update};
use crate::state::AppState;

/// Telegram updates are small; anything larger is not an update.
const MAX_UPDATE_BYTES: usize = 1024 * 1024;

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/telegram", post(telegram_webhook))
}

/// Receive one Telegram update.
///
/// POST /webhook/telegram
#[instrument(skip_all)]
async fn telegram_webhook(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    if state.webhook().authenticate(provided) == WebhookDecision::Rejected {
        warn!("Rejected webhook request");
        return Err(AuthError::WebhookRejected.into());
    }

    let body = to_bytes(request.into_body(), MAX_UPDATE_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("unreadable body".to_owned()))?;
    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Malformed webhook update");
        AppError::BadRequest("malformed update".to_owned())
    })?;

    let config = state.config();
    let dispatcher = Dispatcher::new(
        state.pool(),
        state.cipher(),
        state.settings().current().await,
        config.working_hours_zone,
        &config.fallback_admin_ids,
    );

    let response = match dispatcher.handle(update, Utc::now()).await {
        Some(reply) => Json(reply).into_response(),
        None => Json(json!({ "ok": true })).into_response(),
    };
    Ok(response)
}
