//! Metric recording for the request pipeline
//!
//! - `deliver_requests_total` (counter): label `outcome`
//! - `deliver_request_duration_seconds` (histogram): label `outcome`
//! - `deliver_auth_retries_total` (counter)
//! - `deliver_refresh_total` (counter): label `outcome`
//! - `deliver_refresh_joined_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

/// Bucket boundaries for `deliver_request_duration_seconds`, 10ms to 60s.
pub const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Record a finished `send`, `outcome` being `success` or an error kind.
pub fn record_request(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("deliver_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("deliver_request_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}

/// Record a forced refresh followed by a retry.
pub fn record_auth_retry() {
    metrics::counter!("deliver_auth_retries_total").increment(1);
}

/// Record a finished refresh exchange.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("deliver_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a caller that joined a refresh already in flight.
pub fn record_refresh_joined() {
    metrics::counter!("deliver_refresh_joined_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("success", 0.05);
        record_request("auth_required", 0.2);
        record_auth_retry();
        record_refresh("rejected");
        record_refresh_joined();
    }
}
