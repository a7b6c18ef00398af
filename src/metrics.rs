//! Prometheus metrics for feed and decision monitoring.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::feed::Venue;

// === Metric Name Constants ===

/// Ticker events consumed counter metric name.
pub const METRIC_TICKS_RECEIVED: &str = "feed_ticks_received_total";
/// Funding refreshes counter metric name.
pub const METRIC_FUNDING_UPDATES: &str = "funding_updates_total";
/// Positions opened counter metric name.
pub const METRIC_TRADES_OPENED: &str = "trades_opened_total";
/// Positions closed counter metric name.
pub const METRIC_TRADES_CLOSED: &str = "trades_closed_total";
/// Feed fetch failures counter metric name.
pub const METRIC_FEED_ERRORS: &str = "feed_errors_total";
/// WebSocket messages received counter metric name.
pub const METRIC_WS_MESSAGES: &str = "ws_messages_received_total";
/// WebSocket reconnects counter metric name.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";
/// REST poll latency metric name.
pub const METRIC_REST_POLL_LATENCY: &str = "rest_poll_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_TICKS_RECEIVED,
        "Total number of ticker events consumed by the engine"
    );
    describe_counter!(
        METRIC_FUNDING_UPDATES,
        "Total number of funding rate refreshes"
    );
    describe_counter!(METRIC_TRADES_OPENED, "Total number of simulated opens");
    describe_counter!(METRIC_TRADES_CLOSED, "Total number of simulated closes");
    describe_counter!(METRIC_FEED_ERRORS, "Total number of failed feed fetches");
    describe_counter!(
        METRIC_WS_MESSAGES,
        "Total number of WebSocket messages received"
    );
    describe_counter!(
        METRIC_WS_RECONNECTS,
        "Total number of WebSocket reconnections"
    );
    describe_histogram!(
        METRIC_REST_POLL_LATENCY,
        "REST book ticker fetch latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Increment ticker events consumed for a venue.
pub fn inc_ticks_received(venue: Venue) {
    counter!(METRIC_TICKS_RECEIVED, "venue" => venue.to_string()).increment(1);
}

/// Increment funding refreshes counter.
pub fn inc_funding_updates() {
    counter!(METRIC_FUNDING_UPDATES).increment(1);
}

/// Increment simulated opens counter.
pub fn inc_trades_opened() {
    counter!(METRIC_TRADES_OPENED).increment(1);
}

/// Increment simulated closes counter.
pub fn inc_trades_closed() {
    counter!(METRIC_TRADES_CLOSED).increment(1);
}

/// Increment feed fetch failures for a venue.
pub fn inc_feed_errors(venue: Venue) {
    counter!(METRIC_FEED_ERRORS, "venue" => venue.to_string()).increment(1);
}

/// Increment WebSocket messages received for a venue.
pub fn inc_ws_messages(venue: Venue) {
    counter!(METRIC_WS_MESSAGES, "venue" => venue.to_string()).increment(1);
}

/// Increment WebSocket reconnects for a venue.
pub fn inc_ws_reconnects(venue: Venue) {
    counter!(METRIC_WS_RECONNECTS, "venue" => venue.to_string()).increment(1);
}

/// Record REST poll latency for a venue.
pub fn record_rest_poll_latency(start: Instant, venue: Venue) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_REST_POLL_LATENCY, "venue" => venue.to_string()).record(latency_ms);
}
