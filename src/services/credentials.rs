// src/services/credentials.rs

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::user::{ProfileFields, RegisterRequest, User},
    services::{listings::ListingStore, sessions::SessionManager},
    utils::{
        hash::{hash_password, verify_password},
        storage::BlobStore,
    },
};

/// Why a login attempt was refused. Callers surface all three as the same
/// 401; the distinction only goes to the security log.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("unknown handle")]
    NotFound,
    #[error("account has no password set")]
    NoPasswordSet,
    #[error("password mismatch")]
    Mismatch,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Store(e) => e,
            _ => AppError::Unauthenticated("Invalid handle or password".to_string()),
        }
    }
}

/// Owns the 'users' table.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a user with an Argon2-hashed password.
    ///
    /// Handle uniqueness is decided by the unique index, so two concurrent
    /// registrations of one handle cannot both succeed.
    pub async fn create_user(
        &self,
        handle: &str,
        profile: &ProfileFields,
        password: &str,
    ) -> Result<i64, AppError> {
        let hashed_password = hash_password(password)?;
        self.insert_user(handle, profile, Some(&hashed_password), false)
            .await
    }

    /// Used by start-up seeding. The seeded handle and password must pass the
    /// registration rules, otherwise the account could never log in.
    pub async fn create_admin(&self, handle: &str, password: &str) -> Result<i64, AppError> {
        RegisterRequest {
            name: handle.to_string(),
            password: password.to_string(),
            invite_code: String::new(),
            profile: ProfileFields::default(),
        }
        .validate()?;

        let hashed_password = hash_password(password)?;
        self.insert_user(handle, &ProfileFields::default(), Some(&hashed_password), true)
            .await
    }

    async fn insert_user(
        &self,
        handle: &str,
        profile: &ProfileFields,
        password_hash: Option<&str>,
        is_admin: bool,
    ) -> Result<i64, AppError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(AppError::Validation("Handle must not be empty".to_string()));
        }

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users
            (name, full_name, grade, interests, skills, contact, hide_contact, password_hash, is_admin, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(handle)
        .bind(&profile.full_name)
        .bind(&profile.grade)
        .bind(&profile.interests)
        .bind(&profile.skills)
        .bind(&profile.contact)
        .bind(profile.hide_contact.unwrap_or(false))
        .bind(password_hash)
        .bind(is_admin)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Handle '{}' already exists", handle))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_name(&self, handle: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Checks a handle/password pair.
    pub async fn verify_credentials(&self, handle: &str, password: &str) -> Result<User, AuthFailure> {
        let user = self
            .find_by_name(handle)
            .await?
            .ok_or(AuthFailure::NotFound)?;

        let hash = user.password_hash.as_deref().ok_or(AuthFailure::NoPasswordSet)?;

        if !verify_password(password, hash)? {
            return Err(AuthFailure::Mismatch);
        }

        Ok(user)
    }

    /// Applies every supplied field in one statement.
    /// A new handle must not collide with any other user's.
    pub async fn update_profile(
        &self,
        user_id: i64,
        new_handle: Option<&str>,
        fields: &ProfileFields,
    ) -> Result<User, AppError> {
        let new_handle = new_handle.map(str::trim);
        if new_handle.is_some_and(str::is_empty) {
            return Err(AppError::Validation("Handle must not be empty".to_string()));
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = builder.separated(", ");
        let mut any = false;

        if let Some(name) = new_handle {
            separated.push("name = ");
            separated.push_bind_unseparated(name.to_string());
            any = true;
        }

        let text_fields = [
            ("full_name", &fields.full_name),
            ("grade", &fields.grade),
            ("interests", &fields.interests),
            ("skills", &fields.skills),
            ("contact", &fields.contact),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                separated.push(format!("{column} = "));
                separated.push_bind_unseparated(value.clone());
                any = true;
            }
        }

        if let Some(hide_contact) = fields.hide_contact {
            separated.push("hide_contact = ");
            separated.push_bind_unseparated(hide_contact);
            any = true;
        }

        if !any {
            return self.get(user_id).await;
        }

        builder.push(" WHERE id = ");
        builder.push_bind(user_id);
        builder.push(" RETURNING *");

        builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!(
                        "Handle '{}' already exists",
                        new_handle.unwrap_or_default()
                    ))
                } else {
                    tracing::error!("Failed to update profile: {:?}", e);
                    AppError::from(e)
                }
            })?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Grants or revokes admin. Admins cannot change their own role here.
    pub async fn set_admin_flag(
        &self,
        acting: &User,
        target_id: i64,
        is_admin: bool,
    ) -> Result<User, AppError> {
        if acting.id == target_id {
            return Err(AppError::Forbidden(
                "Cannot change your own admin role".to_string(),
            ));
        }

        sqlx::query_as::<_, User>("UPDATE users SET is_admin = ? WHERE id = ? RETURNING *")
            .bind(is_admin)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Deletes a user and everything they own, in order: sessions, listings
    /// (each with its image blobs), then the user row.
    pub async fn delete_user(
        &self,
        acting: &User,
        target_id: i64,
        sessions: &SessionManager,
        listings: &ListingStore,
        blobs: &dyn BlobStore,
    ) -> Result<(), AppError> {
        if acting.id == target_id {
            return Err(AppError::Forbidden("Cannot delete yourself".to_string()));
        }

        // Existence first so an unknown id leaves nothing half-done.
        self.get(target_id).await?;

        let revoked = sessions.revoke_all_for_user(target_id).await?;
        let removed = listings.delete_all_for_user(target_id, blobs).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(target_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete user: {:?}", e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(
            "User {} deleted by {} ({} sessions, {} listings)",
            target_id,
            acting.id,
            revoked,
            removed
        );
        Ok(())
    }

    /// Newest members first.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
