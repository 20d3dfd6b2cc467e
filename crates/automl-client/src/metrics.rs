//! Counters and histograms emitted by the Vertex AI client.
//!
//! Every REST call is counted under its client operation name (`get_dataset`,
//! `predict`, ...) and HTTP status. Waiting on a long-running operation or a
//! training pipeline bumps `vertex_polls_total` once per status check, so a
//! slow import or training run shows up as a climbing poll count rather than
//! a single long request.

use metrics::{counter, histogram};

/// Exported metric names.
pub mod names {
    /// REST calls, labelled by `operation` and HTTP `status`.
    pub const REQUESTS_TOTAL: &str = "vertex_requests_total";

    /// Transient failures that were retried, labelled by `operation`.
    pub const RETRIES_TOTAL: &str = "vertex_retries_total";

    /// Wall time of one REST call in seconds, labelled by `operation`.
    pub const LATENCY_SECONDS: &str = "vertex_latency_seconds";

    /// Status checks while waiting, labelled by `kind`
    /// (`operation` or `training_pipeline`).
    pub const POLLS_TOTAL: &str = "vertex_polls_total";
}

/// Called once per REST call after the response status is known.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Called before each status check of an LRO or training pipeline.
pub fn record_poll(kind: &str) {
    counter!(
        names::POLLS_TOTAL,
        "kind" => kind.to_string()
    )
    .increment(1);
}
