// src/services/audit.rs

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::security_log::{SecurityEvent, SecurityLogEntry},
};

/// Append-only trail of authentication and authorization events.
#[derive(Clone)]
pub struct SecurityLog {
    pool: SqlitePool,
}

impl SecurityLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends an entry. A failed write is logged, never surfaced to the caller.
    pub async fn record(&self, event: SecurityEvent, source: &str, detail: &str) {
        tracing::warn!(event = event.as_str(), source, detail, "security event");

        let result = sqlx::query(
            "INSERT INTO security_log (event, source, detail, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(event.as_str())
        .bind(source)
        .bind(detail)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to write security log entry: {:?}", e);
        }
    }

    /// Passes `result` through, recording a `forbidden` entry when it is a 403.
    pub async fn on_forbidden<T>(
        &self,
        result: Result<T, AppError>,
        source: &str,
        attempt: &str,
    ) -> Result<T, AppError> {
        if let Err(AppError::Forbidden(reason)) = &result {
            self.record(SecurityEvent::Forbidden, source, &format!("{attempt}: {reason}"))
                .await;
        }
        result
    }

    /// Most recent entries first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<SecurityLogEntry>, AppError> {
        let entries = sqlx::query_as::<_, SecurityLogEntry>(
            "SELECT id, event, source, detail, created_at FROM security_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
