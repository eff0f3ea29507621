// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        bug_report::{BugReport, UpdateBugStatusRequest},
        security_log::{SecurityEvent, SecurityLogParams},
        user::{SetAdminRequest, UserView},
    },
    services::{
        audit::SecurityLog, credentials::CredentialStore, listings::ListingStore,
        sessions::SessionManager,
    },
    utils::{
        guard::{ClientAddr, CurrentUser},
        storage::BlobStore,
    },
};

/// Lists all users, contacts included.
/// Admin only.
pub async fn list_users(
    State(users): State<CredentialStore>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let list: Vec<UserView> = users
        .list_users()
        .await?
        .iter()
        .map(|user| user.view_for(&admin))
        .collect();

    Ok(Json(list))
}

/// Grants or revokes the admin role of another user.
/// Admin only.
pub async fn set_admin(
    State(users): State<CredentialStore>,
    State(audit): State<SecurityLog>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ClientAddr(source): ClientAddr,
    Path(id): Path<i64>,
    Json(payload): Json<SetAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = users.set_admin_flag(&admin, id, payload.is_admin).await;
    let updated = audit
        .on_forbidden(result, &source, &format!("admin {} changing role of user {id}", admin.id))
        .await?;

    audit
        .record(
            SecurityEvent::RoleChanged,
            &source,
            &format!(
                "admin {} set is_admin={} on user {} ('{}')",
                admin.id, updated.is_admin, updated.id, updated.name
            ),
        )
        .await;

    Ok(Json(updated.view_for(&admin)))
}

/// Deletes a user together with their sessions, listings and images.
/// Admin only.
pub async fn delete_user(
    State(users): State<CredentialStore>,
    State(sessions): State<SessionManager>,
    State(listings): State<ListingStore>,
    State(blobs): State<Arc<dyn BlobStore>>,
    State(audit): State<SecurityLog>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ClientAddr(source): ClientAddr,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = users
        .delete_user(&admin, id, &sessions, &listings, blobs.as_ref())
        .await;
    audit
        .on_forbidden(result, &source, &format!("admin {} deleting user {id}", admin.id))
        .await?;

    audit
        .record(
            SecurityEvent::UserDeleted,
            &source,
            &format!("admin {} deleted user {}", admin.id, id),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": 1 })))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub listings: i64,
    pub bugs: i64,
}

/// Admin only.
pub async fn stats(
    State(pool): State<SqlitePool>,
    State(users): State<CredentialStore>,
    State(listings): State<ListingStore>,
) -> Result<impl IntoResponse, AppError> {
    let bugs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bug_reports")
        .fetch_one(&pool)
        .await?;

    Ok(Json(StatsResponse {
        users: users.count().await?,
        listings: listings.count().await?,
        bugs,
    }))
}

/// All bug reports, newest first.
/// Admin only.
pub async fn list_bugs(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let reports = sqlx::query_as::<_, BugReport>(
        "SELECT * FROM bug_reports ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list bug reports: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(reports))
}

/// Moves a bug report to another status.
/// Admin only.
pub async fn update_bug_status(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBugStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let report = sqlx::query_as::<_, BugReport>(
        "UPDATE bug_reports SET status = ? WHERE id = ? RETURNING *",
    )
    .bind(&payload.status)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Bug report not found".to_string()))?;

    Ok(Json(report))
}

/// Recent security events, newest first.
/// Admin only.
pub async fn security_log(
    State(audit): State<SecurityLog>,
    Query(params): Query<SecurityLogParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 500);
    let entries = audit.recent(limit).await?;
    Ok(Json(entries))
}
