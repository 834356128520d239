use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use teamup_shared::errors::AppResult;
use teamup_shared::types::api::ApiResponse;
use teamup_shared::types::auth::AuthUser;

use crate::models::ProfileRecord;
use crate::recommender::Source;
use crate::AppState;

use super::run_blocking;

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub source: Source,
    pub recommendations: Vec<ProfileRecord>,
}

/// Ranked teammate suggestions for the caller, best first.
pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RecommendationsResponse>>> {
    let recommender = state.recommender.clone();
    let served = run_blocking(move || recommender.recommend_for(user.id, Utc::now())).await?;

    Ok(Json(ApiResponse::ok(RecommendationsResponse {
        source: served.source,
        recommendations: served.profiles,
    })))
}
