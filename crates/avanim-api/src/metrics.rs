//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "avanim_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "avanim_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "avanim_http_requests_in_flight";

    pub const RATE_LIMIT_HITS_TOTAL: &str = "avanim_rate_limit_hits_total";
    pub const AUTH_FAILURES_TOTAL: &str = "avanim_auth_failures_total";
    pub const UPLOADS_TOTAL: &str = "avanim_uploads_total";
    pub const ANIMATION_REQUESTS_TOTAL: &str = "avanim_animation_requests_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record an accepted upload (`avatar` or `driving`).
pub fn record_upload(kind: &'static str, bytes: usize) {
    counter!(names::UPLOADS_TOTAL, "kind" => kind).increment(1);
    histogram!("avanim_upload_bytes", "kind" => kind).record(bytes as f64);
}

/// Record the final status of an animation request.
pub fn record_animation_request(source: &'static str, status: &'static str) {
    counter!(
        names::ANIMATION_REQUESTS_TOTAL,
        "source" => source,
        "status" => status
    )
    .increment(1);
}

/// Collapse record IDs and static file names so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    if path.starts_with("/static/") {
        return "/static/*".to_string();
    }
    path.split('/')
        .map(|segment| {
            let is_id = uuid::Uuid::parse_str(segment).is_ok()
                || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()));
            if is_id {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/avatar/550e8400-e29b-41d4-a716-446655440000"),
            "/api/avatar/:id"
        );
        assert_eq!(sanitize_path("/api/admin/user/42"), "/api/admin/user/:id");
        assert_eq!(
            sanitize_path("/static/animations/animation_x.mp4"),
            "/static/*"
        );
        assert_eq!(sanitize_path("/api/expressions"), "/api/expressions");
    }
}
