use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Va,
    Business,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Va => "va",
            UserRole::Business => "business",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-model over the platform user base. Owned by the wider marketplace
/// application; this service only queries it for audience resolution and
/// email lookups.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub admin: bool,
    pub suspended: bool,
    pub email_system_announcements: bool,
}

impl UserProfile {
    pub fn wants_announcement_email(&self) -> bool {
        self.email_system_announcements
    }
}

/// The authenticated caller as seen by the usecases: enough identity to
/// evaluate ownership and announcement visibility, nothing more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub id: Uuid,
    pub role: Option<UserRole>,
    pub admin: bool,
}

impl Viewer {
    pub fn new(id: Uuid, role: Option<UserRole>, admin: bool) -> Self {
        Self { id, role, admin }
    }
}
