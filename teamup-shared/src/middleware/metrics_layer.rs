use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Label used for requests that matched no route. Raw URIs would give every
/// probed path its own series.
const UNMATCHED_PATH: &str = "unmatched";

/// HTTP request latencies are mostly sub-second; a stale-cache request pays
/// for a full regeneration, hence the long tail.
const HTTP_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(matched_path.as_ref());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let labels = [
        ("method", method),
        ("path", path),
        ("status", status),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration);

    response
}

fn route_label(matched_path: Option<&MatchedPath>) -> String {
    matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// Installs the global Prometheus recorder. Call once per process.
///
/// `extra_buckets` sets histogram buckets for service-specific metrics,
/// keyed by full metric name.
pub fn init_metrics(extra_buckets: &[(&str, &[f64])]) -> anyhow::Result<PrometheusHandle> {
    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full("http_request_duration_seconds".into()), HTTP_BUCKETS)?;

    for (name, buckets) in extra_buckets {
        builder = builder.set_buckets_for_metric(Matcher::Full((*name).to_string()), buckets)?;
    }

    let handle = builder.install_recorder()?;
    Ok(handle)
}
