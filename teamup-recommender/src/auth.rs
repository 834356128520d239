use teamup_shared::errors::{AppError, AppResult, ErrorCode};
use teamup_shared::types::auth::{AuthUser, UserRole};

use crate::models::UserAccount;
use crate::store::RecommendationStore;

/// Checks the caller's persisted account rather than the token claim, so a
/// demoted or blocked admin loses access before their token expires.
pub fn require_role(store: &dyn RecommendationStore, user: &AuthUser, role: UserRole) -> AppResult<UserAccount> {
    let account = store
        .get_user_account(user.id)?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    if account.blocked {
        return Err(AppError::new(ErrorCode::UserBlocked, "account is blocked"));
    }

    let allowed = match role {
        UserRole::User => true,
        UserRole::Admin => account.role == UserRole::Admin,
    };
    if !allowed {
        tracing::warn!(user_id = %user.id, required = %role, actual = %account.role, "role check failed");
        return Err(AppError::forbidden(format!("{role} access required")));
    }

    Ok(account)
}
