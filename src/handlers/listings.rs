// src/handlers/listings.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::listing::{
        CreateListingRequest, ListingKind, ListingResponse, SearchParams, UpdateListingRequest,
    },
    services::{
        audit::SecurityLog,
        credentials::CredentialStore,
        listings::{ListingStore, remove_blobs},
        matching::match_for,
    },
    utils::{
        guard::{ClientAddr, CurrentUser},
        html::clean_html,
        storage::BlobStore,
    },
};

/// Most images accepted on one listing.
pub const MAX_IMAGES: usize = 5;

/// How many listings `GET /discover` returns.
const DISCOVER_LIMIT: i64 = 5;

/// All listings, newest first.
pub async fn list_listings(
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let rows: Vec<ListingResponse> = listings
        .list_all()
        .await?
        .into_iter()
        .map(|row| row.view_for(&viewer))
        .collect();

    Ok(Json(rows))
}

pub async fn get_listing(
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row = listings.get_with_author(id).await?;
    Ok(Json(row.view_for(&viewer)))
}

/// An image part of the create form, not yet stored.
struct PendingImage {
    body: Bytes,
    content_type: String,
}

/// Reads the multipart create form.
///
/// Text fields: `title`, `description`, `category`, `tags`, `type`, `price`,
/// `vb` (or `negotiable`). File fields: `images` (repeatable) or `image`.
async fn read_listing_form(
    mut multipart: Multipart,
) -> Result<(CreateListingRequest, Vec<PendingImage>), AppError> {
    let mut req = CreateListingRequest::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "images" | "images[]" | "image" => {
                // Browsers send an empty part when no file was picked.
                if field.file_name().is_none_or(str::is_empty) {
                    continue;
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await?;
                if body.is_empty() {
                    continue;
                }
                if images.len() == MAX_IMAGES {
                    return Err(AppError::Validation(format!(
                        "At most {MAX_IMAGES} images per listing"
                    )));
                }
                images.push(PendingImage { body, content_type });
            }
            "title" => req.title = field.text().await?.trim().to_string(),
            "description" => req.description = field.text().await?,
            "category" => req.category = field.text().await?.trim().to_string(),
            "tags" => req.tags = field.text().await?.trim().to_string(),
            "type" => {
                let raw = field.text().await?;
                req.kind = if raw.trim().is_empty() {
                    ListingKind::default()
                } else {
                    raw.parse().map_err(AppError::Validation)?
                };
            }
            "price" => {
                let price = field.text().await?.trim().to_string();
                req.price = (!price.is_empty()).then_some(price);
            }
            "vb" | "negotiable" => {
                let raw = field.text().await?;
                req.negotiable = matches!(raw.trim(), "1" | "true" | "on" | "yes");
            }
            other => {
                tracing::debug!("Ignoring unknown listing form field '{}'", other);
            }
        }
    }

    Ok((req, images))
}

/// Creates a listing from a multipart form.
///
/// Images are stored first; if any store or the insert fails, the images
/// already written are removed again.
pub async fn create_listing(
    State(listings): State<ListingStore>,
    State(blobs): State<Arc<dyn BlobStore>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (mut payload, pending) = read_listing_form(multipart).await?;
    payload.validate()?;
    payload.description = clean_html(&payload.description);

    let mut stored = Vec::with_capacity(pending.len());
    for image in pending {
        match blobs.store(image.body, &image.content_type).await {
            Ok(path) => stored.push(path),
            Err(e) => {
                remove_blobs(blobs.as_ref(), &stored).await;
                return Err(e.into());
            }
        }
    }

    let listing = match listings.create(owner.id, &payload, stored.clone()).await {
        Ok(listing) => listing,
        Err(e) => {
            remove_blobs(blobs.as_ref(), &stored).await;
            return Err(e);
        }
    };

    tracing::info!(
        "User {} created listing {} with {} images",
        owner.id,
        listing.id,
        stored.len()
    );

    let row = listings.get_with_author(listing.id).await?;
    Ok((StatusCode::CREATED, Json(row.view_for(&owner))))
}

/// Updates a listing. Owner or admin only.
pub async fn update_listing(
    State(listings): State<ListingStore>,
    State(audit): State<SecurityLog>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ClientAddr(source): ClientAddr,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdateListingRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.description = payload.description.as_deref().map(clean_html);

    let result = listings.update(&actor, id, &payload).await;
    let listing = audit
        .on_forbidden(result, &source, &format!("user {} updating listing {id}", actor.id))
        .await?;
    let row = listings.get_with_author(listing.id).await?;
    Ok(Json(row.view_for(&actor)))
}

/// Deletes a listing and its images. Owner or admin only.
pub async fn delete_listing(
    State(listings): State<ListingStore>,
    State(blobs): State<Arc<dyn BlobStore>>,
    State(audit): State<SecurityLog>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ClientAddr(source): ClientAddr,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = listings.delete(&actor, id, blobs.as_ref()).await;
    audit
        .on_forbidden(result, &source, &format!("user {} deleting listing {id}", actor.id))
        .await?;
    tracing::info!("Listing {} deleted by user {}", id, actor.id);
    Ok(Json(serde_json::json!({ "deleted": 1 })))
}

/// Substring search. A blank query returns nothing.
pub async fn search_listings(
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Ok(Json(Vec::<ListingResponse>::new()));
    }

    let rows: Vec<ListingResponse> = listings
        .search(query)
        .await?
        .into_iter()
        .map(|row| row.view_for(&viewer))
        .collect();

    Ok(Json(rows))
}

pub async fn discover(
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let rows: Vec<ListingResponse> = listings
        .random(DISCOVER_LIMIT)
        .await?
        .into_iter()
        .map(|row| row.view_for(&viewer))
        .collect();

    Ok(Json(rows))
}

/// Up to five listings of other members, best keyword matches first.
pub async fn match_listings(
    State(users): State<CredentialStore>,
    State(listings): State<ListingStore>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let matches = match_for(&users, &listings, user_id, &viewer).await?;
    Ok(Json(matches))
}
