// src/services/listings.rs

use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::{
        listing::{CreateListingRequest, Listing, ListingRow, UpdateListingRequest},
        user::User,
    },
    services::ownership::authorize_mutation,
    utils::storage::BlobStore,
};

/// Listing columns joined with the owner's public fields.
const LISTING_WITH_AUTHOR: &str = r#"
    SELECT
        l.id, l.user_id, l.title, l.description, l.category, l.tags, l.kind,
        l.price, l.negotiable, l.images, l.created_at,
        u.name AS author_name,
        u.full_name AS author_full_name,
        u.contact AS author_contact,
        u.hide_contact AS author_hide_contact
    FROM listings l
    JOIN users u ON u.id = l.user_id
"#;

/// Newest first; ids break ties between rows created in the same instant.
const NEWEST_FIRST: &str = " ORDER BY l.created_at DESC, l.id DESC";

/// Owns the 'listings' table.
#[derive(Clone)]
pub struct ListingStore {
    pool: SqlitePool,
}

impl ListingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        owner_id: i64,
        req: &CreateListingRequest,
        images: Vec<String>,
    ) -> Result<Listing, AppError> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings
            (user_id, title, description, category, tags, kind, price, negotiable, images, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.category)
        .bind(&req.tags)
        .bind(req.kind)
        .bind(&req.price)
        .bind(req.negotiable)
        .bind(Json(images))
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create listing: {:?}", e);
            AppError::from(e)
        })?;

        Ok(listing)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Listing>, AppError> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    pub async fn get(&self, id: i64) -> Result<Listing, AppError> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
    }

    pub async fn get_with_author(&self, id: i64) -> Result<ListingRow, AppError> {
        sqlx::query_as::<_, ListingRow>(&format!("{LISTING_WITH_AUTHOR} WHERE l.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
    }

    pub async fn list_all(&self) -> Result<Vec<ListingRow>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!("{LISTING_WITH_AUTHOR}{NEWEST_FIRST}"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<ListingRow>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_WITH_AUTHOR} WHERE l.user_id = ?{NEWEST_FIRST}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Match candidates: every listing not owned by `user_id`, newest first.
    pub async fn list_not_owned_by(&self, user_id: i64) -> Result<Vec<ListingRow>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_WITH_AUTHOR} WHERE l.user_id != ?{NEWEST_FIRST}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Case-insensitive substring search over title, description and tags.
    pub async fn search(&self, query: &str) -> Result<Vec<ListingRow>, AppError> {
        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            r#"{LISTING_WITH_AUTHOR}
            WHERE l.title LIKE ? ESCAPE '\'
               OR l.description LIKE ? ESCAPE '\'
               OR l.tags LIKE ? ESCAPE '\'
            {NEWEST_FIRST}"#
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn random(&self, limit: i64) -> Result<Vec<ListingRow>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_WITH_AUTHOR} ORDER BY RANDOM() LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Updates the supplied fields if `actor` owns the listing or is an admin.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        req: &UpdateListingRequest,
    ) -> Result<Listing, AppError> {
        let listing = self.get(id).await?;
        authorize_mutation(actor, &listing)?;

        if req.is_empty() {
            return Ok(listing);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE listings SET ");
        let mut separated = builder.separated(", ");

        let text_fields = [
            ("title", &req.title),
            ("description", &req.description),
            ("category", &req.category),
            ("tags", &req.tags),
            ("price", &req.price),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                separated.push(format!("{column} = "));
                separated.push_bind_unseparated(value.clone());
            }
        }

        if let Some(kind) = req.kind {
            separated.push("kind = ");
            separated.push_bind_unseparated(kind);
        }

        if let Some(negotiable) = req.negotiable {
            separated.push("negotiable = ");
            separated.push_bind_unseparated(negotiable);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        builder
            .build_query_as::<Listing>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update listing: {:?}", e);
                AppError::from(e)
            })?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
    }

    /// Deletes a listing if `actor` owns it or is an admin, then removes its
    /// images. The row deletion is authoritative; blob cleanup is best-effort.
    pub async fn delete(&self, actor: &User, id: i64, blobs: &dyn BlobStore) -> Result<(), AppError> {
        let listing = self.get(id).await?;
        authorize_mutation(actor, &listing)?;
        self.remove(&listing, blobs).await
    }

    /// Removes every listing of a user. Returns how many were deleted.
    pub async fn delete_all_for_user(
        &self,
        user_id: i64,
        blobs: &dyn BlobStore,
    ) -> Result<usize, AppError> {
        let owned = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        for listing in &owned {
            self.remove(listing, blobs).await?;
        }
        Ok(owned.len())
    }

    async fn remove(&self, listing: &Listing, blobs: &dyn BlobStore) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(listing.id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete listing: {:?}", e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Listing not found".to_string()));
        }

        remove_blobs(blobs, listing.image_paths()).await;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Deletes each blob, logging failures instead of returning them.
pub async fn remove_blobs(blobs: &dyn BlobStore, paths: &[String]) {
    for path in paths {
        if let Err(e) = blobs.delete(path).await {
            tracing::warn!("Failed to delete blob {}: {}", path, e);
        }
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
