// src/services/matching.rs
//
// Keyword matching between a member's interests/skills and other members'
// listings. A keyword scores when it occurs anywhere in the listing text,
// including inside longer words ("art" matches "party").

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::AppError,
    models::{listing::ScoredListing, user::User},
    services::{credentials::CredentialStore, listings::ListingStore},
};

/// Maximum number of suggestions returned.
pub const MATCH_LIMIT: usize = 5;

static KEYWORD_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]+").unwrap());

/// Lowercased, de-duplicated keywords from a member's interests and skills.
pub fn keywords(interests: Option<&str>, skills: Option<&str>) -> BTreeSet<String> {
    let joined = format!(
        "{} {}",
        interests.unwrap_or_default(),
        skills.unwrap_or_default()
    )
    .to_lowercase();

    KEYWORD_SEPARATORS
        .split(&joined)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Number of keywords contained in `text`. `text` must already be lowercase.
pub fn score(keywords: &BTreeSet<String>, text: &str) -> usize {
    keywords.iter().filter(|k| text.contains(k.as_str())).count()
}

/// Scores candidates, drops zero scores and keeps the best [`MATCH_LIMIT`].
///
/// The sort is stable, so equal scores keep the candidates' input order.
pub fn rank<T>(
    keywords: &BTreeSet<String>,
    candidates: Vec<T>,
    text_of: impl Fn(&T) -> String,
) -> Vec<(T, usize)> {
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(T, usize)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let s = score(keywords, &text_of(&candidate));
            (s > 0).then_some((candidate, s))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(MATCH_LIMIT);
    scored
}

/// Recomputes match suggestions for `user_id` as seen by `viewer`.
pub async fn match_for(
    users: &CredentialStore,
    listings: &ListingStore,
    user_id: i64,
    viewer: &User,
) -> Result<Vec<ScoredListing>, AppError> {
    let user = users.get(user_id).await?;
    let keywords = keywords(user.interests.as_deref(), user.skills.as_deref());
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = listings.list_not_owned_by(user.id).await?;
    tracing::debug!(
        "Matching {} keywords against {} listings for user {}",
        keywords.len(),
        candidates.len(),
        user.id
    );

    Ok(rank(&keywords, candidates, |row| row.listing.searchable_text())
        .into_iter()
        .map(|(row, score)| ScoredListing {
            listing: row.view_for(viewer),
            score,
        })
        .collect())
}
