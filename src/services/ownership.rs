// src/services/ownership.rs

use crate::{error::AppError, models::{listing::Listing, user::User}};

/// Update and delete of a listing are reserved for its owner and admins.
pub fn authorize_mutation(actor: &User, listing: &Listing) -> Result<(), AppError> {
    if actor.id == listing.user_id || actor.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not authorized to modify this listing".to_string(),
        ))
    }
}
