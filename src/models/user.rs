// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login handle.
    pub name: String,

    /// Free-text display name.
    pub full_name: Option<String>,

    pub grade: Option<String>,
    pub interests: Option<String>,
    pub skills: Option<String>,
    pub contact: Option<String>,

    /// Hides `contact` from other non-admin members.
    pub hide_contact: bool,

    /// Argon2 password hash. `None` for legacy accounts without a password.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: Option<String>,

    pub is_admin: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Contact is visible when not hidden, to the owner, and to admins.
    pub fn contact_visible_to(&self, viewer: &User) -> bool {
        !self.hide_contact || viewer.id == self.id || viewer.is_admin
    }

    /// Profile as seen by `viewer`.
    pub fn view_for(&self, viewer: &User) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            grade: self.grade.clone(),
            interests: self.interests.clone(),
            skills: self.skills.clone(),
            contact: if self.contact_visible_to(viewer) {
                self.contact.clone()
            } else {
                None
            },
            hide_contact: self.hide_contact,
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }
}

/// A profile with contact visibility already applied.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    pub grade: Option<String>,
    pub interests: Option<String>,
    pub skills: Option<String>,
    pub contact: Option<String>,
    pub hide_contact: bool,
    pub is_admin: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Editable profile fields. `None` means "leave unchanged" on update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileFields {
    #[validate(length(max = 100, message = "Display name must be at most 100 characters."))]
    pub full_name: Option<String>,
    #[validate(length(max = 20))]
    pub grade: Option<String>,
    #[validate(length(max = 500, message = "Interests must be at most 500 characters."))]
    pub interests: Option<String>,
    #[validate(length(max = 500, message = "Skills must be at most 500 characters."))]
    pub skills: Option<String>,
    #[validate(length(max = 200))]
    pub contact: Option<String>,
    pub hide_contact: Option<bool>,
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 2, max = 32, message = "Handle length must be between 2 and 32 characters."),
        custom(function = validate_handle)
    )]
    pub name: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[serde(rename = "inviteCode", alias = "invite_code", default)]
    pub invite_code: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: ProfileFields,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for `PUT /api/me`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 2, max = 32, message = "Handle length must be between 2 and 32 characters."),
        custom(function = validate_handle)
    )]
    pub name: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: ProfileFields,
}

/// DTO for toggling the admin role.
#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// Handles are single tokens: no whitespace, no control characters.
fn validate_handle(name: &str) -> Result<(), validator::ValidationError> {
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(validator::ValidationError::new("invalid_handle")
            .with_message("Handle must not contain whitespace.".into()));
    }
    Ok(())
}
