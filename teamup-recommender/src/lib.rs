use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use teamup_shared::middleware::{metrics_middleware, JwtSecret};

pub mod auth;
pub mod config;
pub mod models;
pub mod recommender;
pub mod routes;
pub mod schema;
pub mod store;

use config::AppConfig;
use recommender::Recommender;
use store::RecommendationStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn RecommendationStore>,
    pub recommender: Arc<Recommender>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl JwtSecret for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Recommendations
        .route("/recommendations", get(routes::recommendations::get_recommendations))
        .route("/connections/:id/status", get(routes::connections::connection_status))
        .route("/me/profile", put(routes::profile::update_profile))
        // Admin
        .route(
            "/admin/recommendations/regenerate",
            post(routes::admin::regenerate),
        )
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
