use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teamup_shared::errors::{AppError, AppResult, ErrorCode};
use teamup_shared::types::api::ApiResponse;
use teamup_shared::types::auth::AuthUser;

use crate::AppState;

use super::run_blocking;

/// Request state between the caller and another user.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Caller has sent a request to the other user.
    pub requested: bool,
    /// The other user has sent a request to the caller.
    pub requested_by: bool,
    pub mutual: bool,
}

pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(other_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ConnectionStatus>>> {
    if other_id == user.id {
        return Err(AppError::bad_request("cannot query a connection with yourself"));
    }

    let store = state.store.clone();
    let status = run_blocking(move || {
        if store.get_user_account(other_id)?.is_none() {
            return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
        }
        let requested = store.is_requested(user.id, other_id)?;
        let requested_by = store.is_requested(other_id, user.id)?;
        Ok(ConnectionStatus {
            requested,
            requested_by,
            mutual: requested && requested_by,
        })
    })
    .await?;

    Ok(Json(ApiResponse::ok(status)))
}
