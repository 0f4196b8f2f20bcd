use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use tb_common::db::{find_user_id, replace_preferences};
use tb_common::publish::TenderPublisher;
use tb_common::textparse::squash_whitespace;

use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub email: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Replace the caller's category filter set and create one filtered
/// subscription per category. Subscription failures are logged; the
/// stored preference rows are the source of truth.
pub async fn save(
    State(state): State<SharedState>,
    Json(request): Json<PreferencesRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = squash_whitespace(&request.email).to_lowercase();
    if email.is_empty() {
        return Err(ApiError::BadRequest("email is required".into()));
    }

    let categories = normalize_categories(&request.categories);

    let user_id = find_user_id(&state.pool, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user not found: {email}")))?;

    replace_preferences(&state.pool, user_id, &categories).await?;

    for category in &categories {
        if let Err(err) = state.publisher.subscribe(&email, category).await {
            warn!(%email, category, error = %err, "subscription create failed");
        }
    }

    info!(user_id, count = categories.len(), "replaced user preferences");
    Ok(Json(json!({ "userId": user_id, "categories": categories })))
}

pub(crate) fn normalize_categories(raw: &[String]) -> Vec<String> {
    let mut categories = Vec::new();
    for value in raw {
        let cleaned = squash_whitespace(value).to_lowercase();
        if !cleaned.is_empty() && !categories.contains(&cleaned) {
            categories.push(cleaned);
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_squashed_lowercased_and_deduplicated() {
        let raw = vec![
            "  Civil   Works ".to_string(),
            "civil works".to_string(),
            "".to_string(),
            "ICT".to_string(),
        ];
        assert_eq!(
            normalize_categories(&raw),
            vec!["civil works".to_string(), "ict".to_string()]
        );
    }

    #[test]
    fn empty_input_yields_no_categories() {
        assert!(normalize_categories(&[]).is_empty());
        assert!(normalize_categories(&["   ".to_string()]).is_empty());
    }
}
