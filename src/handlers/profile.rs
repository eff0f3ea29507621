use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        listing::ListingResponse,
        user::{UpdateProfileRequest, UserView},
    },
    services::{credentials::CredentialStore, listings::ListingStore},
    utils::guard::CurrentUser,
};

/// Get current user's profile.
pub async fn get_me(
    State(users): State<CredentialStore>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    // Re-read so the response reflects writes made earlier in this session.
    let fresh = users.get(me.id).await?;
    Ok(Json(fresh.view_for(&fresh)))
}

/// Updates the current user's profile. Omitted fields stay unchanged.
pub async fn update_me(
    State(users): State<CredentialStore>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let updated = users
        .update_profile(me.id, payload.name.as_deref(), &payload.profile)
        .await?;

    tracing::info!("User {} updated their profile", updated.id);
    Ok(Json(updated.view_for(&updated)))
}

/// Member directory, newest first.
pub async fn list_users(
    State(users): State<CredentialStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let list: Vec<UserView> = users
        .list_users()
        .await?
        .iter()
        .map(|user| user.view_for(&viewer))
        .collect();

    Ok(Json(list))
}

pub async fn get_user(
    State(users): State<CredentialStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = users.get(id).await?;
    Ok(Json(user.view_for(&viewer)))
}

/// A member's listings, newest first. 404 if the member does not exist.
pub async fn user_listings(
    State(users): State<CredentialStore>,
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    users.get(id).await?;

    let rows: Vec<ListingResponse> = listings
        .list_by_user(id)
        .await?
        .into_iter()
        .map(|row| row.view_for(&viewer))
        .collect();

    Ok(Json(rows))
}
