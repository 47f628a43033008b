//! Authentication extractors for the admin API.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;

use stockbot_core::{Action, Role, permissions};

use crate::error::AppError;
use crate::security::session::token_from_cookie_header;
use crate::security::{AdminSession, AuthError};
use crate::state::AppState;

/// Extractor that requires a valid admin session cookie.
///
/// Rejects with 401 and a generic JSON body when the cookie is missing,
/// malformed, forged, or expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminSession(session): RequireAdminSession,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", session.username)
/// }
/// ```
pub struct RequireAdminSession(pub AdminSession);

impl RequireAdminSession {
    /// Role carried by every admin session.
    pub const ROLE: Role = Role::Admin;

    /// Check `action` for the session's role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the role lacks the action.
    pub fn authorize(&self, action: Action) -> Result<(), AppError> {
        permissions::authorize(Self::ROLE, action).map_err(AppError::from)
    }
}

impl FromRequestParts<AppState> for RequireAdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(token_from_cookie_header)
            .ok_or(AuthError::InvalidSession)?;

        let session = state.sessions().verify(&token, Utc::now())?;
        Ok(Self(session))
    }
}
