//! Metrics collection and exposition.
//!
//! # Metrics
//! - `image_builder_requests_total` (counter): requests by method, status
//! - `image_builder_request_duration_seconds` (histogram): latency distribution
//! - `image_builder_compose_errors_total` (counter): server errors on `/compose`
//!
//! # Design Decisions
//! - One process-wide Prometheus recorder, installed on first use
//! - Histogram buckets tuned for typical web latencies

use std::sync::OnceLock;
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "image_builder_requests_total";
pub const REQUEST_DURATION: &str = "image_builder_request_duration_seconds";
pub const COMPOSE_ERRORS: &str = "image_builder_compose_errors_total";

const LATENCY_BUCKETS: [f64; 11] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

static HANDLE: OnceLock<Result<PrometheusHandle, String>> = OnceLock::new();

/// Install the Prometheus recorder (once) and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, String> {
    HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), &LATENCY_BUCKETS)
                .map_err(|e| e.to_string())?
                .install_recorder()
                .map_err(|e| e.to_string())
        })
        .clone()
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION).record(start.elapsed().as_secs_f64());
}

pub fn record_compose_error() {
    metrics::counter!(COMPOSE_ERRORS).increment(1);
}

/// Count and time every request passing through.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let response = next.run(req).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
