//! User roles.

use serde::{Deserialize, Serialize};

/// Role assigned to a chat user.
///
/// Stored by name in the `roles` table. The set is closed: roles are seeded
/// at startup and cannot be created by end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including user and settings management.
    Admin,
    /// Standard chat user. May manage only the items they created.
    #[default]
    User,
}

impl Role {
    /// All roles, in seeding order.
    pub const ALL: [Self; 2] = [Self::Admin, Self::User];

    /// Name stored in the `roles` table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" | "standard" => Ok(Self::User),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
