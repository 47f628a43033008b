//! Role resolution for chat users.

use sqlx::PgPool;
use tracing::warn;

use stockbot_core::{Action, FieldCipher, PermissionError, Role, TelegramUserId, permissions};

use crate::db::UserRepository;

/// Resolves a Telegram user's role and checks permissions.
pub struct AccessControl<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
    fallback_admins: &'a [TelegramUserId],
}

impl<'a> AccessControl<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        cipher: &'a FieldCipher,
        fallback_admins: &'a [TelegramUserId],
    ) -> Self {
        Self {
            pool,
            cipher,
            fallback_admins,
        }
    }

    /// Role stored in the database, falling back to the configured admin list
    /// for unknown users or when the lookup fails.
    pub async fn role_of(&self, telegram_user_id: TelegramUserId) -> Role {
        match UserRepository::new(self.pool, self.cipher)
            .role_of(telegram_user_id)
            .await
        {
            Ok(Some(role)) => role,
            Ok(None) => fallback_role(self.fallback_admins, telegram_user_id),
            Err(e) => {
                warn!(%telegram_user_id, error = %e, "Role lookup failed, using fallback");
                fallback_role(self.fallback_admins, telegram_user_id)
            }
        }
    }

    /// Check `action` for `role`.
    ///
    /// # Errors
    ///
    /// Returns `PermissionError` when the role lacks the action.
    pub fn authorize(role: Role, action: Action) -> Result<(), PermissionError> {
        permissions::authorize(role, action)
    }
}

/// Role for a user with no database record.
#[must_use]
pub fn fallback_role(fallback_admins: &[TelegramUserId], telegram_user_id: TelegramUserId) -> Role {
    if fallback_admins.contains(&telegram_user_id) {
        Role::Admin
    } else {
        Role::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_role() {
        let admins = [TelegramUserId::new(1), TelegramUserId::new(2)];
        assert_eq!(fallback_role(&admins, TelegramUserId::new(2)), Role::Admin);
        assert_eq!(fallback_role(&admins, TelegramUserId::new(3)), Role::User);
        assert_eq!(fallback_role(&[], TelegramUserId::new(1)), Role::User);
    }

    #[test]
    fn test_authorize_wraps_engine() {
        assert!(AccessControl::authorize(Role::Admin, Action::ManageUsers).is_ok());
        assert!(AccessControl::authorize(Role::User, Action::ManageUsers).is_err());
    }
}
