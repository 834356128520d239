use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;

use teamup_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

use super::run_blocking;

/// Probes the database and reports cache age.
///
/// A missing or stale table only degrades the service: the next
/// recommendation request rebuilds it.
pub async fn health_check(State(state): State<Arc<AppState>>) -> HealthResponse {
    let store = state.store.clone();
    let database = match run_blocking(move || store.ping()).await {
        Ok(()) => HealthCheck::new("database", HealthStatus::Healthy),
        Err(e) => HealthCheck::new("database", HealthStatus::Unhealthy).with_message(e.to_string()),
    };

    let recommender = state.recommender.clone();
    let written_at = tokio::task::spawn_blocking(move || recommender.cache_written_at())
        .await
        .unwrap_or(None);
    let policy = state.recommender.policy();
    let cache = match written_at {
        Some(ts) if policy.is_fresh(ts, Utc::now()) => HealthCheck::new("recommendation_cache", HealthStatus::Healthy),
        Some(ts) => HealthCheck::new("recommendation_cache", HealthStatus::Degraded)
            .with_message(format!("last written {ts}")),
        None => HealthCheck::new("recommendation_cache", HealthStatus::Degraded)
            .with_message("not generated yet"),
    };

    HealthResponse::healthy("teamup-recommender", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![database, cache])
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
