use opentelemetry::metrics::{Counter, Meter};

pub const REQUEST_COUNTER_NAME: &str = "http_server_duration_count";
pub const REQUEST_COUNTER_UNIT: &str = "request";
pub const REQUEST_COUNTER_DESCRIPTION: &str = "Number of HTTP requests";

/// Default instrument registered on every meter handed out by the lifecycle manager.
pub fn request_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(REQUEST_COUNTER_NAME)
        .with_unit(REQUEST_COUNTER_UNIT)
        .with_description(REQUEST_COUNTER_DESCRIPTION)
        .build()
}
