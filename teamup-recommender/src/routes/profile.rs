use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use teamup_shared::errors::AppResult;
use teamup_shared::types::api::ApiResponse;
use teamup_shared::types::auth::AuthUser;

use crate::models::{normalize_open_for, normalize_vocabulary, ProfileChanges, ProfileRecord};
use crate::AppState;

use super::run_blocking;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,
    #[validate(length(max = 120))]
    pub college: Option<String>,
    #[validate(length(max = 120))]
    pub branch: Option<String>,
    #[validate(range(min = 1, max = 6))]
    pub year: Option<i32>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 10), custom = "validate_open_for")]
    pub open_for: Option<Vec<String>>,
    #[validate(length(max = 30), custom = "validate_vocabulary")]
    pub skills: Option<Vec<String>>,
    #[validate(length(max = 30), custom = "validate_vocabulary")]
    pub interests: Option<Vec<String>>,
}

/// Skill and interest names are stored in `VARCHAR(100)` columns.
const MAX_NAME_CHARS: usize = 100;
const MAX_OPEN_FOR_CHARS: usize = 50;

fn check_item_lengths(items: &[String], max: usize) -> Result<(), ValidationError> {
    if items.iter().any(|item| item.trim().chars().count() > max) {
        let mut err = ValidationError::new("item_too_long");
        err.add_param("max".into(), &max);
        return Err(err);
    }
    Ok(())
}

fn validate_vocabulary(names: &[String]) -> Result<(), ValidationError> {
    check_item_lengths(names, MAX_NAME_CHARS)
}

fn validate_open_for(labels: &[String]) -> Result<(), ValidationError> {
    check_item_lengths(labels, MAX_OPEN_FOR_CHARS)
}

impl UpdateProfileRequest {
    /// Trims free-text fields so whitespace-only names fail validation.
    fn trimmed(mut self) -> Self {
        for field in [&mut self.display_name, &mut self.college, &mut self.branch, &mut self.bio] {
            if let Some(value) = field {
                *value = value.trim().to_string();
            }
        }
        self
    }

    fn into_changes(self) -> ProfileChanges {
        ProfileChanges {
            display_name: self.display_name,
            college: self.college,
            branch: self.branch,
            year: self.year,
            bio: self.bio,
            open_for: self.open_for.as_deref().map(normalize_open_for),
            skills: self.skills.as_deref().map(normalize_vocabulary),
            interests: self.interests.as_deref().map(normalize_vocabulary),
        }
    }
}

/// Updates the caller's profile. Skill and interest lists replace the stored
/// sets; new recommendations pick them up at the next regeneration.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<ProfileRecord>>> {
    let body = body.trimmed();
    body.validate()?;
    let changes = body.into_changes();

    let store = state.store.clone();
    let user_id = user.id;
    let record = run_blocking(move || store.update_profile(user_id, &changes)).await?;

    tracing::info!(user_id = %user_id, "profile updated");
    Ok(Json(ApiResponse::ok_with_message(record, "profile updated")))
}
