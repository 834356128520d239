use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// Body of `GET /health`.
///
/// `status` is the most severe status among `checks`, and decides the HTTP
/// status the response renders with.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
}

/// Ordered by severity, so `max()` over checks yields the rollup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Degraded instances keep serving; only unhealthy ones report 503.
    pub fn http_status(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl HealthResponse {
    pub fn healthy(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            service: service.into(),
            version: version.into(),
            checks: None,
        }
    }

    pub fn with_checks(mut self, checks: Vec<HealthCheck>) -> Self {
        self.status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        self.checks = Some(checks);
        self
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        (self.status.http_status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_check_wins() {
        let resp = HealthResponse::healthy("svc", "0.1.0").with_checks(vec![
            HealthCheck::new("database", HealthStatus::Healthy),
            HealthCheck::new("cache", HealthStatus::Degraded).with_message("stale"),
        ]);
        assert_eq!(resp.status, HealthStatus::Degraded);

        let resp = HealthResponse::healthy("svc", "0.1.0").with_checks(vec![
            HealthCheck::new("database", HealthStatus::Unhealthy),
            HealthCheck::new("cache", HealthStatus::Degraded),
        ]);
        assert_eq!(resp.status, HealthStatus::Unhealthy);
        assert_eq!(resp.status.http_status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = HealthResponse::healthy("svc", "0.1.0").with_checks(vec![]);
        assert_eq!(resp.status, HealthStatus::Healthy);
    }

    #[test]
    fn degraded_still_renders_ok() {
        let resp = HealthResponse::healthy("svc", "0.1.0")
            .with_checks(vec![HealthCheck::new("cache", HealthStatus::Degraded)])
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn error_envelope_shape() {
        let body = serde_json::to_value(ApiErrorResponse::new("E0002", "bad year")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0002");
        assert!(body["error"].get("details").is_none());
    }
}
