use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use teamup_shared::errors::{AppError, AppResult, ErrorCode};
use teamup_shared::types::api::ApiResponse;
use teamup_shared::types::auth::{AuthUser, UserRole};

use crate::auth::require_role;
use crate::recommender::generator::GenerationStats;
use crate::AppState;

use super::run_blocking;

/// Rebuilds the whole recommendation table now, ignoring freshness.
pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<GenerationStats>>> {
    let store = state.store.clone();
    let admin = run_blocking(move || require_role(store.as_ref(), &user, UserRole::Admin)).await?;

    tracing::info!(admin_id = %admin.id, "forced recommendation regeneration");

    let recommender = state.recommender.clone();
    let stats = run_blocking(move || {
        recommender
            .regenerate(Utc::now())
            .map_err(|e| AppError::new(ErrorCode::RegenerationFailed, format!("regeneration failed: {e}")))
    })
    .await?;

    Ok(Json(ApiResponse::ok_with_message(stats, "recommendations regenerated")))
}
