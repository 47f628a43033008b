//! Role-based permission engine.
//!
//! Resolution is a pure table lookup from [`Role`] to the set of [`Action`]s it
//! grants. Anything not listed is denied.
//!
//! Resource-scoped checks ("may this user delete items they did not
//! create?") go through [`can_manage_item`], which combines the role's
//! permissions with an ownership predicate supplied by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Role, TelegramUserId};

/// Something an actor may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewItems,
    AddItem,
    UpdateAvailability,
    DeleteItem,
    /// Act on items created by someone else.
    ManageAnyItem,
    ViewUsers,
    /// Add users, change roles, delete users, store credentials.
    ManageUsers,
    ViewDashboard,
    ManageSettings,
}

impl Action {
    /// Every action, for exhaustive checks.
    pub const ALL: [Self; 9] = [
        Self::ViewItems,
        Self::AddItem,
        Self::UpdateAvailability,
        Self::DeleteItem,
        Self::ManageAnyItem,
        Self::ViewUsers,
        Self::ManageUsers,
        Self::ViewDashboard,
        Self::ManageSettings,
    ];
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ViewItems => "view_items",
            Self::AddItem => "add_item",
            Self::UpdateAvailability => "update_availability",
            Self::DeleteItem => "delete_item",
            Self::ManageAnyItem => "manage_any_item",
            Self::ViewUsers => "view_users",
            Self::ManageUsers => "manage_users",
            Self::ViewDashboard => "view_dashboard",
            Self::ManageSettings => "manage_settings",
        };
        f.write_str(name)
    }
}

const ADMIN_PERMISSIONS: &[Action] = &Action::ALL;

const USER_PERMISSIONS: &[Action] = &[
    Action::ViewItems,
    Action::AddItem,
    Action::UpdateAvailability,
    Action::DeleteItem,
];

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// The actor is known but not entitled to the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("role `{role}` is not permitted to {action}")]
pub struct PermissionError {
    pub role: Role,
    pub action: Action,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert a denial into a `PermissionError` for `?` propagation.
    ///
    /// # Errors
    ///
    /// Returns `PermissionError` when the decision is `Deny`.
    pub const fn into_result(self, role: Role, action: Action) -> Result<(), PermissionError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(PermissionError { role, action }),
        }
    }
}

/// The fixed permission set granted to `role`.
#[must_use]
pub const fn permission_set(role: Role) -> &'static [Action] {
    match role {
        Role::Admin => ADMIN_PERMISSIONS,
        Role::User => USER_PERMISSIONS,
    }
}

/// Resolve whether `role` may perform `action`. Deny by default.
#[must_use]
pub fn resolve(role: Role, action: Action) -> Decision {
    if permission_set(role).contains(&action) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Shorthand for `resolve(role, action).into_result(role, action)`.
///
/// # Errors
///
/// Returns `PermissionError` when `role` lacks `action`.
pub fn authorize(role: Role, action: Action) -> Result<(), PermissionError> {
    resolve(role, action).into_result(role, action)
}

/// Whether `actor` with `role` may update or delete an item created by `created_by`.
///
/// Roles holding [`Action::ManageAnyItem`] may manage any item. Everyone else
/// may manage only items they created; items without a recorded creator are
/// off limits to them.
#[must_use]
pub fn can_manage_item(
    role: Role,
    actor: TelegramUserId,
    created_by: Option<TelegramUserId>,
) -> Decision {
    if resolve(role, Action::ManageAnyItem).is_allowed() {
        return Decision::Allow;
    }
    match created_by {
        Some(owner) if owner == actor => Decision::Allow,
        _ => Decision::Deny,
    }
}
