//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - `request` - method, normalized path, status and latency of every request
//! - `ingest` - read usefulness and hit count per ingest call
//! - `classify` - convergence and bin counts per classification

use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use regex_lite::Regex;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing; records can be aggregated from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "hybrid_graph_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

fn dynamic_segment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|\b\d+\b")
            .expect("static pattern is valid")
    })
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces UUIDs and numeric segments with `:id`.
fn normalize_path(path: &str) -> String {
    dynamic_segment().replace_all(path, ":id").to_string()
}

/// Record one ingest call.
pub fn record_ingest_metrics(hits: usize, useful: bool, latency_ms: u64) {
    info!(
        target: "hybrid_graph_kernel::metrics",
        metric_type = "ingest",
        hits = hits,
        useful = useful,
        latency_ms = latency_ms,
        "ingest_metric"
    );
}

/// Record one classification.
pub fn record_classify_metrics(converged: bool, bins: usize, unresolved: usize, latency_ms: u64) {
    info!(
        target: "hybrid_graph_kernel::metrics",
        metric_type = "classify",
        converged = converged,
        bins = bins,
        unresolved = unresolved,
        latency_ms = latency_ms,
        "classify_metric"
    );
}
