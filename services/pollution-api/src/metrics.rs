//! Prometheus metrics.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

pub const REQUESTS_TOTAL: &str = "pollution_requests_total";
pub const ERRORS_TOTAL: &str = "pollution_errors_total";
pub const RENDER_DURATION: &str = "pollution_render_duration_seconds";
pub const FEATURES_RETURNED: &str = "pollution_features_returned";
pub const DATASET_SWAPS: &str = "pollution_dataset_swaps_total";

/// Register descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(REQUESTS_TOTAL, Unit::Count, "Requests received, by endpoint");
    describe_counter!(ERRORS_TOTAL, Unit::Count, "Failed requests, by error kind");
    describe_histogram!(RENDER_DURATION, Unit::Seconds, "Time spent rendering rasters");
    describe_histogram!(FEATURES_RETURNED, Unit::Count, "Features per feature collection");
    describe_counter!(DATASET_SWAPS, Unit::Count, "Active dataset switches");
}

pub fn record_request(endpoint: &'static str) {
    counter!(REQUESTS_TOTAL, "endpoint" => endpoint).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_render(elapsed: Duration) {
    histogram!(RENDER_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_features(count: usize) {
    histogram!(FEATURES_RETURNED).record(count as f64);
}

pub fn record_swap() {
    counter!(DATASET_SWAPS).increment(1);
}
