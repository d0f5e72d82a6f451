//! Prometheus metrics for report-service.
//!
//! Read-path cache outcomes, recompute latency and invalidation failures, plus the
//! `/metrics` handler.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Read-path cache outcomes (hit/miss/error) per scope (listing, dashboard).
    pub static ref READ_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "report_read_cache_events_total",
        "Read-path cache events segmented by scope and outcome",
        &["scope", "event"]
    )
    .expect("failed to register report_read_cache_events_total");

    /// Time spent recomputing a result from the document store on a cache miss.
    pub static ref RECOMPUTE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "report_recompute_duration_seconds",
        "Store recomputation duration on cache miss segmented by scope",
        &["scope"]
    )
    .expect("failed to register report_recompute_duration_seconds");

    /// Invalidations that failed and were left to TTL expiry.
    pub static ref INVALIDATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "report_invalidation_failures_total",
        "Cache invalidations that failed segmented by scope",
        &["scope"]
    )
    .expect("failed to register report_invalidation_failures_total");

    /// Notification queue outcomes (queued/dropped/sent/failed).
    pub static ref NOTIFICATION_EVENTS: IntCounterVec = register_int_counter_vec!(
        "report_notification_events_total",
        "Notification queue events segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register report_notification_events_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
