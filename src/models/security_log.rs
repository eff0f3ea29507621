use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kinds of events written to the security log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    LoginFailed,
    InviteDenied,
    Registered,
    Unauthenticated,
    Forbidden,
    RoleChanged,
    UserDeleted,
}

impl SecurityEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEvent::LoginFailed => "login_failed",
            SecurityEvent::InviteDenied => "invite_denied",
            SecurityEvent::Registered => "registered",
            SecurityEvent::Unauthenticated => "unauthenticated",
            SecurityEvent::Forbidden => "forbidden",
            SecurityEvent::RoleChanged => "role_changed",
            SecurityEvent::UserDeleted => "user_deleted",
        }
    }
}

/// Represents the append-only 'security_log' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SecurityLogEntry {
    pub id: i64,
    pub event: String,
    pub source: String,
    pub detail: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SecurityLogParams {
    /// Default 100, max 500.
    pub limit: Option<i64>,
}
