use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use super::user::User;

/// What a listing is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ListingKind {
    #[default]
    Offer,
    Request,
    Project,
}

impl FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offer" => Ok(ListingKind::Offer),
            "request" => Ok(ListingKind::Request),
            "project" => Ok(ListingKind::Project),
            other => Err(format!("Unknown listing type '{other}'")),
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListingKind::Offer => "offer",
            ListingKind::Request => "request",
            ListingKind::Project => "project",
        };
        f.write_str(s)
    }
}

/// Represents the 'listings' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Listing {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Comma-separated.
    pub tags: String,
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub price: Option<String>,
    pub negotiable: bool,
    /// Public paths of stored images.
    pub images: Json<Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Listing {
    /// Lowercased title, description and tags, the text keywords are matched against.
    pub fn searchable_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.tags).to_lowercase()
    }

    pub fn image_paths(&self) -> &[String] {
        &self.images.0
    }
}

/// A listing joined with its owner's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub author_name: String,
    pub author_full_name: Option<String>,
    pub author_contact: Option<String>,
    pub author_hide_contact: bool,
}

impl ListingRow {
    /// Applies the same contact visibility rule as [`User::contact_visible_to`].
    pub fn view_for(self, viewer: &User) -> ListingResponse {
        let visible = !self.author_hide_contact
            || viewer.id == self.listing.user_id
            || viewer.is_admin;
        ListingResponse {
            listing: self.listing,
            author_name: self.author_name,
            author_full_name: self.author_full_name,
            author_contact: if visible { self.author_contact } else { None },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingResponse {
    #[serde(flatten)]
    pub listing: Listing,
    pub author_name: String,
    pub author_full_name: Option<String>,
    pub author_contact: Option<String>,
}

/// Validated listing fields, assembled from the multipart create form.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateListingRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 chars"))]
    pub description: String,
    #[validate(length(max = 50))]
    pub category: String,
    #[validate(length(max = 200, message = "Tags must be at most 200 chars"))]
    pub tags: String,
    pub kind: ListingKind,
    #[validate(length(max = 20))]
    pub price: Option<String>,
    pub negotiable: bool,
}

/// DTO for updating a listing. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateListingRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    #[validate(length(max = 200))]
    pub tags: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ListingKind>,
    #[validate(length(max = 20))]
    pub price: Option<String>,
    #[serde(alias = "vb")]
    pub negotiable: Option<bool>,
}

impl UpdateListingRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.kind.is_none()
            && self.price.is_none()
            && self.negotiable.is_none()
    }
}

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// One entry of a match result.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredListing {
    pub listing: ListingResponse,
    pub score: usize,
}
