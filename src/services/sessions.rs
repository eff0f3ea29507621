// src/services/sessions.rs

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sqlx::SqlitePool;

use crate::{error::AppError, models::user::User};

/// Random bytes per token; hex-encoded this gives 64 characters.
const TOKEN_BYTES: usize = 32;

/// Generates an opaque token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: User,
}

/// Issues, resolves and revokes session tokens.
///
/// A session is active from creation until `expires_at` or until it is
/// revoked, whichever comes first. Sessions are not extended on use.
#[derive(Clone)]
pub struct SessionManager {
    pool: SqlitePool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create_session(&self, user_id: i64) -> Result<String, AppError> {
        self.create_session_at(user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let token = generate_token();

        sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(user_id)
        .bind(now + self.ttl)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create session: {:?}", e);
            AppError::from(e)
        })?;

        tracing::debug!("Session issued for user {}", user_id);
        Ok(token)
    }

    pub async fn resolve_session(&self, token: &str) -> Result<User, AppError> {
        self.resolve_session_at(token, Utc::now()).await
    }

    /// Resolves `token` to its user as of `now`.
    /// An expired row found here is deleted on the spot.
    pub async fn resolve_session_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT
                s.expires_at,
                u.id, u.name, u.full_name, u.grade, u.interests, u.skills,
                u.contact, u.hide_contact, u.password_hash, u.is_admin, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid session".to_string()))?;

        if row.expires_at <= now {
            self.revoke_session(token).await?;
            return Err(AppError::Unauthenticated("Session expired".to_string()));
        }

        Ok(row.user)
    }

    /// Idempotent: revoking an unknown token is not an error.
    pub async fn revoke_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes every session expired as of `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
