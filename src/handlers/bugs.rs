use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::bug_report::{BugReport, CreateBugReportRequest},
    utils::html::clean_html,
};

/// Submits a bug report. Public: no session needed.
pub async fn create_bug(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateBugReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let category = payload.category.as_deref().unwrap_or("bug");
    let reporter = payload.reporter.as_deref().unwrap_or("Anonymous");

    let report = sqlx::query_as::<_, BugReport>(
        r#"
        INSERT INTO bug_reports (title, description, category, reporter, status, created_at)
        VALUES (?, ?, ?, ?, 'open', ?)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(clean_html(&payload.description))
    .bind(category)
    .bind(reporter)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store bug report: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(
        target: "bug_reports",
        id = report.id,
        category = %report.category,
        reporter = %report.reporter,
        "New bug report: {}",
        report.title
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": report.id, "success": true })),
    ))
}
