use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Profile errors
/// - E3xxx: Recommendation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,
    UserBlocked,

    // Profile (E2xxx)
    ProfileNotFound,
    UserNotFound,

    // Recommendation (E3xxx)
    RegenerationFailed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0008",

            // Auth
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::UserBlocked => "E1014",

            // Profile
            Self::ProfileNotFound => "E2001",
            Self::UserNotFound => "E2002",

            // Recommendation
            Self::RegenerationFailed => "E3001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::RegenerationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ProfileNotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::UserBlocked => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Known { code, .. } => code.status_code(),
            AppError::Database(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_default();
        AppError::with_details(ErrorCode::ValidationError, "request validation failed", details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_response = match &self {
            AppError::Known { code, message, details } => {
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                resp
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                ApiErrorResponse::new("E0001", "internal server error")
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => ApiErrorResponse::new("E0003", "resource not found"),
                    _ => ApiErrorResponse::new("E0001", "database error"),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(ErrorCode::UserBlocked.code(), "E1014");
        assert_eq!(ErrorCode::UserBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ProfileNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::RegenerationFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_errors_are_server_errors() {
        let err = AppError::from(diesel::result::Error::RollbackTransaction);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = AppError::from(diesel::result::Error::NotFound);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn anyhow_errors_render_as_500() {
        let response = AppError::from(anyhow::anyhow!("pool exhausted")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
