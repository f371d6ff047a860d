//! Prometheus metrics for the relay and the search proxy
//!
//! All metrics live in the default registry and are exposed by the web
//! server at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

// ======================
// RELAY METRICS
// ======================

/// Event streams opened for download requests
pub static RELAY_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tubedrop_relay_started_total", "Total number of download relays started").unwrap()
});

/// Relays currently attached to a child process
pub static RELAY_ACTIVE: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("tubedrop_relay_active", "Download relays currently running").unwrap());

/// Finished relays by outcome
/// Labels: outcome (completed/failed/timed_out/cancelled/spawn_failed)
pub static RELAY_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tubedrop_relay_outcomes_total",
        "Finished download relays by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Wall-clock duration of one relay, start to close
pub static RELAY_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tubedrop_relay_duration_seconds",
        "Time from stream start to stream close",
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 240.0, 480.0]
    )
    .unwrap()
});

/// Stdout lines forwarded to clients
pub static RELAY_LINES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tubedrop_relay_lines_total", "Downloader output lines forwarded to clients").unwrap()
});

/// Keep-alive frames skipped because the client buffer was full
pub static RELAY_KEEPALIVES_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tubedrop_relay_keepalives_dropped_total",
        "Keep-alive frames dropped under backpressure"
    )
    .unwrap()
});

/// Progress and step lines skipped while the client was not reading
pub static RELAY_LINES_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tubedrop_relay_lines_dropped_total",
        "Downloader output lines dropped or collapsed under backpressure"
    )
    .unwrap()
});

// ======================
// SEARCH METRICS
// ======================

/// Search requests by status
/// Labels: status (ok/bad_request/error)
pub static SEARCH_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("tubedrop_search_requests_total", "Search requests by status", &["status"]).unwrap()
});

/// Time spent waiting for the search provider
pub static SEARCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tubedrop_search_duration_seconds",
        "Time spent in the search provider",
        vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

/// Touch every metric so they show up in /metrics before first use.
pub fn init_metrics() {
    Lazy::force(&RELAY_STARTED_TOTAL);
    Lazy::force(&RELAY_ACTIVE);
    Lazy::force(&RELAY_OUTCOMES_TOTAL);
    Lazy::force(&RELAY_DURATION_SECONDS);
    Lazy::force(&RELAY_LINES_TOTAL);
    Lazy::force(&RELAY_KEEPALIVES_DROPPED_TOTAL);
    Lazy::force(&RELAY_LINES_DROPPED_TOTAL);
    Lazy::force(&SEARCH_REQUESTS_TOTAL);
    Lazy::force(&SEARCH_DURATION_SECONDS);
}

pub fn record_relay_outcome(outcome: &str, elapsed_secs: f64) {
    RELAY_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    RELAY_DURATION_SECONDS.observe(elapsed_secs);
}

pub fn record_search(status: &str, elapsed_secs: f64) {
    SEARCH_REQUESTS_TOTAL.with_label_values(&[status]).inc();
    SEARCH_DURATION_SECONDS.observe(elapsed_secs);
}

/// Encodes the default registry in the Prometheus text format.
pub fn gather_text() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((
        encoder.format_type().to_string(),
        String::from_utf8_lossy(&buffer).into_owned(),
    ))
}
