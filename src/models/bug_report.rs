use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Statuses an admin may move a report through.
pub const BUG_STATUSES: [&str; 4] = ["open", "in_progress", "resolved", "closed"];

/// Represents the 'bug_reports' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BugReport {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String, // 'bug', 'feature', ...
    pub reporter: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for submission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBugReportRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 30))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub reporter: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBugStatusRequest {
    #[validate(custom(function = validate_status))]
    pub status: String,
}

fn validate_status(status: &str) -> Result<(), validator::ValidationError> {
    if !BUG_STATUSES.contains(&status) {
        return Err(validator::ValidationError::new("invalid_bug_status"));
    }
    Ok(())
}
